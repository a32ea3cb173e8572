//! # Nodelock
//!
//! **Node-locked licensing for Rust: licenses bound to a USB security dongle.**
//!
//! Nodelock binds a vendor-issued activation key to one physical dongle and
//! re-checks that binding whenever the host asks. A license is only valid
//! while the dongle is attached, the stored record is unexpired, and the
//! sealed license key still matches the record and the device.
//!
//! ## Features
//!
//! - **Hardware binding**: hardware id is the SHA-256 of the dongle fingerprint
//! - **Sealed license keys**: PBKDF2-SHA256 + AES-256-CBC under a vendor master key
//! - **Tamper detection**: any edit to the record, the key or the device fails validation
//! - **Entitlement cache**: cap checks reuse a validation for 30 minutes
//! - **Presence events**: background poller publishes connect/disconnect transitions
//!
//! ## Quickstart
//!
//! ```no_run
//! use nodelock::{FileLicenseStore, FakeToken, LicenseManager, NodelockConfig};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), nodelock::NodelockError> {
//!     let config = NodelockConfig::new("vendor-master-key");
//!     let store = FileLicenseStore::new(config.store_namespace)?;
//!     // Real deployments use `HidToken` (feature `hid`).
//!     let token = FakeToken::new("dev-workstation");
//!
//!     let manager = LicenseManager::new(config, Arc::new(token), Arc::new(store))?;
//!     let result = manager.validate();
//!
//!     if result.valid {
//!         println!("Licensed: {:?}", result.license_type);
//!     } else {
//!         println!("{}", result.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Threat Model
//!
//! Nodelock protects against:
//! - **Record copying**: a record moved to another dongle fails the integrity hash
//! - **Record editing**: changing type, id or key invalidates the license
//! - **Forged activation keys**: keys must decrypt under the master key
//!
//! Nodelock does **not** prevent binary patching, master key extraction or
//! dongle cloning. Client-side licensing can always be bypassed by a
//! determined attacker with access to the binary.
//!
//! ## Configuration
//!
//! - `master_key`: Vendor secret used to seal keys (never logged)
//! - `product_salt`: Mixed into every integrity hash
//! - `cache_ttl`: How long a validation satisfies cap checks
//!
//! See [`NodelockConfig`] for full documentation.

#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Hardware layer
pub mod token;

// Persistence layer
pub mod store;

// Cache layer
pub mod cache;

// Policy layer
pub mod policy;

// Manager (main public API)
pub mod manager;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::NodelockConfig;
pub use crypto::{AesCryptoProvider, CryptoProvider};
pub use errors::NodelockError;
pub use manager::{LicenseManager, ValidationResult};
pub use policy::access::{CapKind, UsageCaps};
pub use protocol::activation::ActivationPayload;
pub use protocol::models::{LicenseInfo, LicenseRecord, LicenseType};
pub use store::{FileLicenseStore, LicenseStore, MemoryLicenseStore};
#[cfg(feature = "hid")]
pub use token::HidToken;
pub use token::{ConnectionEvent, FakeToken, HardwareToken, PollerHandle, TokenMonitor};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;

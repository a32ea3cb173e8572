//! Nodelock configuration.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Salt mixed into every license integrity hash.
pub const DEFAULT_PRODUCT_SALT: &str = "GymManager2024";

/// How long a successful validation is reused before re-validating (30 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Interval of the background dongle poll (2 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default USB vendor id of the dongle.
pub const DEFAULT_VENDOR_ID: u16 = 0x1234;

/// Default USB product id of the dongle.
pub const DEFAULT_PRODUCT_ID: u16 = 0x5678;

/// Configuration for node-locked license validation.
///
/// Loaded once at startup and treated as read-only afterwards.
#[derive(Debug)]
pub struct NodelockConfig {
    /// Master key for license and activation key encryption.
    /// SECURITY: This should be embedded in your application, not read from a plain config file.
    /// Redacted in `Debug` output and wiped on drop.
    pub master_key: SecretString,

    /// Product salt appended to the integrity hash input.
    pub product_salt: &'static str,

    /// Freshness window of the cached entitlement.
    pub cache_ttl: Duration,

    /// Period of the background dongle presence poll.
    pub poll_interval: Duration,

    /// USB vendor id the HID dongle is filtered by.
    pub vendor_id: u16,

    /// USB product id the HID dongle is filtered by.
    pub product_id: u16,

    /// Namespace (directory under the user data dir) for the file license store.
    pub store_namespace: &'static str,
}

impl NodelockConfig {
    /// Create a configuration with default settings around a master key.
    pub fn new(master_key: impl Into<String>) -> Self {
        Self {
            master_key: SecretString::from(master_key.into()),
            product_salt: DEFAULT_PRODUCT_SALT,
            cache_ttl: DEFAULT_CACHE_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            store_namespace: "nodelock",
        }
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), crate::NodelockError> {
        if self.master_key.expose_secret().is_empty() {
            return Err(crate::NodelockError::Config(
                "master_key cannot be empty".to_string(),
            ));
        }
        if self.product_salt.is_empty() {
            return Err(crate::NodelockError::Config(
                "product_salt cannot be empty".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(crate::NodelockError::Config(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.store_namespace.is_empty() {
            return Err(crate::NodelockError::Config(
                "store_namespace cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

//! License Manager - the main public API for Nodelock.
//!
//! The `LicenseManager` binds licenses to a hardware dongle:
//! - Activation of a vendor-issued key on the attached dongle
//! - Validation with expiry and integrity checks
//! - Cached entitlement and branch/user cap queries
//!
//! Public entry points never return errors. Every failure becomes an invalid
//! [`ValidationResult`] with a message that is safe to show to the user.

use crate::cache::snapshot::EntitlementCache;
use crate::clock::{Clock, SystemClock};
use crate::config::NodelockConfig;
use crate::crypto::digest::{integrity_input, short_id};
use crate::crypto::{AesCryptoProvider, CryptoProvider};
use crate::policy::access::{can_add, check_access, CapKind};
use crate::protocol::activation::decode_activation_key;
use crate::protocol::models::{days_remaining, is_expired, LicenseInfo, LicenseRecord, LicenseType};
use crate::store::LicenseStore;
use crate::token::HardwareToken;
use crate::NodelockError;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// License validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the license is valid.
    pub valid: bool,

    /// Message safe to display to the user.
    pub message: String,

    /// License type (valid results only).
    pub license_type: Option<LicenseType>,

    /// Branch cap (valid results only).
    pub max_branches: Option<u32>,

    /// User cap (valid results only).
    pub max_users: Option<u32>,

    /// Whole days until expiry; `None` for perpetual or invalid licenses.
    pub days_remaining: Option<i64>,

    /// Why the license was rejected (invalid results only).
    pub rejection: Option<NodelockError>,
}

impl ValidationResult {
    fn granted(record: &LicenseRecord, now: DateTime<Utc>, message: &str) -> Self {
        Self {
            valid: true,
            message: message.to_string(),
            license_type: Some(record.license_type),
            max_branches: Some(record.max_branches),
            max_users: Some(record.max_users),
            days_remaining: days_remaining(record.expires_at, now),
            rejection: None,
        }
    }

    fn rejected(reason: NodelockError) -> Self {
        Self {
            valid: false,
            message: reason.user_message(),
            license_type: None,
            max_branches: None,
            max_users: None,
            days_remaining: None,
            rejection: Some(reason),
        }
    }
}

/// Main license manager for Nodelock.
///
/// Create one instance per process and share it. All methods take `&self`
/// and may be called from several threads while the dongle poller runs.
pub struct LicenseManager {
    config: NodelockConfig,
    clock: Arc<dyn Clock>,
    token: Arc<dyn HardwareToken>,
    store: Arc<dyn LicenseStore>,
    crypto: Arc<dyn CryptoProvider>,
    cache: EntitlementCache,
    /// Serializes validate/activate flows and the cache update that ends them.
    flow_lock: Mutex<()>,
}

impl LicenseManager {
    /// Create a license manager with the default AES provider and system clock.
    ///
    /// # Errors
    /// Returns `Config` if configuration validation fails.
    pub fn new(
        config: NodelockConfig,
        token: Arc<dyn HardwareToken>,
        store: Arc<dyn LicenseStore>,
    ) -> Result<Self, NodelockError> {
        Self::with_crypto(config, token, store, Arc::new(AesCryptoProvider))
    }

    /// Create a license manager with a custom crypto provider.
    pub fn with_crypto(
        config: NodelockConfig,
        token: Arc<dyn HardwareToken>,
        store: Arc<dyn LicenseStore>,
        crypto: Arc<dyn CryptoProvider>,
    ) -> Result<Self, NodelockError> {
        config.validate()?;
        Ok(Self::assemble(config, token, store, crypto, Arc::new(SystemClock)))
    }

    /// Create a license manager with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: NodelockConfig,
        token: Arc<dyn HardwareToken>,
        store: Arc<dyn LicenseStore>,
        crypto: Arc<dyn CryptoProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodelockError> {
        config.validate()?;
        Ok(Self::assemble(config, token, store, crypto, clock))
    }

    fn assemble(
        config: NodelockConfig,
        token: Arc<dyn HardwareToken>,
        store: Arc<dyn LicenseStore>,
        crypto: Arc<dyn CryptoProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = EntitlementCache::new(config.cache_ttl);
        Self {
            config,
            clock,
            token,
            store,
            crypto,
            cache,
            flow_lock: Mutex::new(()),
        }
    }

    /// Whether the dongle is attached right now.
    pub fn is_token_present(&self) -> bool {
        self.token.is_present()
    }

    /// Validate the license bound to the attached dongle.
    ///
    /// This performs the full validation pipeline:
    /// 1. Check the dongle is present
    /// 2. Read its hardware id
    /// 3. Look up the active license for that id
    /// 4. Reject expired licenses
    /// 5. Verify the sealed license key against the record and device
    /// 6. Bump the validation counters
    ///
    /// On success the entitlement cache is refreshed; on failure it is cleared.
    pub fn validate(&self) -> ValidationResult {
        debug!("Starting license validation");
        match self.validate_and_cache() {
            Ok((record, now)) => {
                info!(
                    license_type = %record.license_type,
                    expires = %expiry_label(record.expires_at),
                    "License valid"
                );
                ValidationResult::granted(&record, now, "License valid")
            }
            Err(reason) => {
                log_rejection("validation", &reason);
                ValidationResult::rejected(reason)
            }
        }
    }

    /// Bind a vendor-issued activation key to the attached dongle.
    ///
    /// A dongle can be activated once. Later attempts return
    /// `AlreadyActivated` and leave the store unchanged.
    pub fn activate(&self, activation_key: &str) -> ValidationResult {
        debug!("Starting license activation");
        match self.activate_and_cache(activation_key) {
            Ok((record, now)) => {
                info!(license_id = %record.license_id, "License activated");
                ValidationResult::granted(&record, now, "License activated successfully")
            }
            Err(reason) => {
                log_rejection("activation", &reason);
                ValidationResult::rejected(reason)
            }
        }
    }

    /// Current entitlement, revalidating when the cached one is stale.
    ///
    /// Returns `None` when no valid license exists.
    pub fn current_entitlement(&self) -> Option<LicenseInfo> {
        let now = self.clock.now_utc();
        if let Some(info) = self.cache.fresh(now) {
            if check_access(&info, now).is_ok() {
                return Some(info);
            }
        }

        match self.validate_and_cache() {
            Ok((record, _)) => Some(LicenseInfo::from(&record)),
            Err(reason) => {
                log_rejection("revalidation", &reason);
                None
            }
        }
    }

    /// Whether the host may create one more branch.
    ///
    /// # Arguments
    /// * `current_branches` - Live branch count, supplied by the host
    pub fn can_add_branch(&self, current_branches: u32) -> bool {
        can_add(
            self.current_entitlement().as_ref(),
            CapKind::Branches,
            current_branches,
        )
    }

    /// Whether the host may create one more user.
    ///
    /// # Arguments
    /// * `current_users` - Live user count, supplied by the host
    pub fn can_add_user(&self, current_users: u32) -> bool {
        can_add(
            self.current_entitlement().as_ref(),
            CapKind::Users,
            current_users,
        )
    }

    /// Any active license recorded in the store, without touching the dongle.
    pub fn installed_license(&self) -> Option<LicenseInfo> {
        match self.store.find_any_active() {
            Ok(record) => record.as_ref().map(LicenseInfo::from),
            Err(e) => {
                warn!(error = %e, "Failed to query installed license");
                None
            }
        }
    }

    /// Drop the cached entitlement so the next query revalidates.
    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    /// Get the current configuration.
    pub fn config(&self) -> &NodelockConfig {
        &self.config
    }

    /// Validate and publish the outcome to the cache while holding the flow
    /// lock, so the cache always reflects the last completed validation.
    fn validate_and_cache(&self) -> Result<(LicenseRecord, DateTime<Utc>), NodelockError> {
        let _flow = self.flow_lock.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = self.try_validate();
        match &outcome {
            Ok((record, now)) => self.cache.store(LicenseInfo::from(record), *now),
            Err(_) => self.cache.clear(),
        }
        outcome
    }

    /// Activate and prime the cache while holding the flow lock.
    fn activate_and_cache(
        &self,
        activation_key: &str,
    ) -> Result<(LicenseRecord, DateTime<Utc>), NodelockError> {
        let _flow = self.flow_lock.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = self.try_activate(activation_key);
        if let Ok((record, now)) = &outcome {
            self.cache.store(LicenseInfo::from(record), *now);
        }
        outcome
    }

    fn try_validate(&self) -> Result<(LicenseRecord, DateTime<Utc>), NodelockError> {
        let hardware_id = self.read_identity()?;

        let mut record = self
            .store
            .find_by_hardware_id(&hardware_id)?
            .filter(|r| r.is_active)
            .ok_or_else(|| {
                warn!(hardware_id = %short_id(&hardware_id), "No license for hardware id");
                NodelockError::RecordNotFound
            })?;

        let now = self.clock.now_utc();
        if let Some(expires_at) = record.expires_at.filter(|_| record.is_expired_at(now)) {
            return Err(NodelockError::Expired { expires_at });
        }

        self.verify_integrity(&record, &hardware_id)?;

        let count = record.validation_count.saturating_add(1);
        match self.store.update_counters(&record.license_id, now, count) {
            Ok(()) => {
                record.last_validation = Some(now);
                record.validation_count = count;
            }
            // Counters are a usage metric; the license itself is still valid.
            Err(e) => warn!(error = %e, "Failed to persist validation counters"),
        }

        Ok((record, now))
    }

    fn try_activate(
        &self,
        activation_key: &str,
    ) -> Result<(LicenseRecord, DateTime<Utc>), NodelockError> {
        if activation_key.trim().is_empty() {
            return Err(NodelockError::MalformedActivationKey);
        }

        let hardware_id = self.read_identity()?;

        if self.store.find_by_hardware_id(&hardware_id)?.is_some() {
            return Err(NodelockError::AlreadyActivated);
        }

        let now = self.clock.now_utc();
        let grant = decode_activation_key(
            activation_key,
            self.crypto.as_ref(),
            self.config.master_key.expose_secret(),
            now,
        )?;
        if let Some(expires_at) = grant.expires_at.filter(|&at| is_expired(Some(at), now)) {
            return Err(NodelockError::Expired { expires_at });
        }

        let license_id = Uuid::new_v4().to_string();
        let hash = self.license_hash(&license_id, &hardware_id, grant.license_type)?;
        let license_key = self
            .crypto
            .encrypt(&hash, self.config.master_key.expose_secret())
            .map_err(|_| NodelockError::Crypto)?;

        let record = LicenseRecord {
            license_id,
            license_key,
            hardware_id,
            license_type: grant.license_type,
            max_branches: grant.max_branches,
            max_users: grant.max_users,
            issued_at: now,
            expires_at: grant.expires_at,
            last_validation: Some(now),
            validation_count: 1,
            is_active: true,
        };

        self.store.insert(record.clone()).map_err(|e| match e {
            NodelockError::DuplicateHardwareId => NodelockError::AlreadyActivated,
            other => other,
        })?;

        Ok((record, now))
    }

    /// Presence check followed by identity read.
    fn read_identity(&self) -> Result<String, NodelockError> {
        if !self.token.is_present() {
            return Err(NodelockError::HardwareAbsent);
        }

        self.token
            .hardware_id()
            .filter(|id| !id.is_empty())
            .ok_or(NodelockError::HardwareReadFailure)
    }

    fn license_hash(
        &self,
        license_id: &str,
        hardware_id: &str,
        license_type: LicenseType,
    ) -> Result<String, NodelockError> {
        let input = integrity_input(
            license_id,
            hardware_id,
            license_type.as_str(),
            self.config.product_salt,
        );
        self.crypto.hash(&input).map_err(|_| NodelockError::Crypto)
    }

    /// Compare the sealed license key with a freshly computed hash.
    ///
    /// Decrypt failures and mismatches both surface as `IntegrityFailure`;
    /// only the log tells them apart.
    fn verify_integrity(
        &self,
        record: &LicenseRecord,
        hardware_id: &str,
    ) -> Result<(), NodelockError> {
        let expected = self.license_hash(&record.license_id, hardware_id, record.license_type)?;

        let stored = self
            .crypto
            .decrypt(&record.license_key, self.config.master_key.expose_secret())
            .map_err(|e| {
                error!(error = %e, license_id = %record.license_id, "License key could not be opened");
                NodelockError::IntegrityFailure
            })?;

        if expected != stored {
            error!(license_id = %record.license_id, "License integrity compromised");
            return Err(NodelockError::IntegrityFailure);
        }

        Ok(())
    }
}

fn expiry_label(expires_at: Option<DateTime<Utc>>) -> String {
    expires_at
        .map(|e| e.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "perpetual".to_string())
}

fn log_rejection(flow: &str, reason: &NodelockError) {
    match reason {
        NodelockError::HardwareAbsent
        | NodelockError::RecordNotFound
        | NodelockError::Expired { .. }
        | NodelockError::AlreadyActivated
        | NodelockError::MalformedActivationKey => {
            warn!(flow, reason = %reason, "License rejected")
        }
        NodelockError::Crypto => error!(flow, "Cryptographic failure during license check"),
        other => error!(flow, reason = %other, "License check failed"),
    }
}

//! License record, license types and the entitlement snapshot.

use crate::NodelockError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of license, which determines the default caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LicenseType {
    /// Trial license (30 days, 1 branch, 3 users).
    Trial,
    /// Standard license (1 branch, 10 users).
    Standard,
    /// Enterprise license.
    Enterprise,
}

impl LicenseType {
    /// Canonical upper-case name used in hashes and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::Trial => "TRIAL",
            LicenseType::Standard => "STANDARD",
            LicenseType::Enterprise => "ENTERPRISE",
        }
    }

    /// Default branch cap.
    pub fn default_max_branches(&self) -> u32 {
        match self {
            LicenseType::Trial | LicenseType::Standard => 1,
            LicenseType::Enterprise => 99,
        }
    }

    /// Default user cap.
    pub fn default_max_users(&self) -> u32 {
        match self {
            LicenseType::Trial => 3,
            LicenseType::Standard => 10,
            LicenseType::Enterprise => 999,
        }
    }

    /// Default lifetime when an activation key carries no expiry.
    /// `None` means perpetual.
    pub fn default_term(&self) -> Option<Duration> {
        match self {
            LicenseType::Trial => Some(Duration::days(30)),
            LicenseType::Standard | LicenseType::Enterprise => None,
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseType {
    type Err = NodelockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRIAL" => Ok(LicenseType::Trial),
            "STANDARD" => Ok(LicenseType::Standard),
            "ENTERPRISE" => Ok(LicenseType::Enterprise),
            _ => Err(NodelockError::MalformedActivationKey),
        }
    }
}

/// Persistent license record, one per activated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Unique license id (UUID v4).
    pub license_id: String,

    /// Sealed integrity token, `encrypt(hash(...), master_key)`.
    pub license_key: String,

    /// SHA-256 of the dongle fingerprint.
    pub hardware_id: String,

    /// License type.
    pub license_type: LicenseType,

    /// Maximum number of branches.
    pub max_branches: u32,

    /// Maximum number of users.
    pub max_users: u32,

    /// When the license was activated.
    pub issued_at: DateTime<Utc>,

    /// Expiry (None = perpetual).
    pub expires_at: Option<DateTime<Utc>>,

    /// Last successful validation.
    pub last_validation: Option<DateTime<Utc>>,

    /// Number of successful validations. Never decreases.
    pub validation_count: u64,

    /// Soft-disable flag.
    pub is_active: bool,
}

impl LicenseRecord {
    /// Whether the license is expired at `now`.
    ///
    /// An expiry equal to `now` counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.expires_at, now)
    }
}

/// Expiry rule shared by every code path: `expires_at <= now` is expired.
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(expires_at, Some(expiry) if expiry <= now)
}

/// Whole days left until `expires_at`, rounded down. `None` for perpetual.
pub fn days_remaining(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    expires_at.map(|expiry| (expiry - now).num_seconds().div_euclid(86_400))
}

/// Entitlement snapshot handed to the host.
///
/// Mirrors the record fields the host needs; never holds the license key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseInfo {
    /// License id.
    pub license_id: String,

    /// License type.
    pub license_type: LicenseType,

    /// Maximum number of branches.
    pub max_branches: u32,

    /// Maximum number of users.
    pub max_users: u32,

    /// When the license was activated.
    pub issued_at: DateTime<Utc>,

    /// Expiry (None = perpetual).
    pub expires_at: Option<DateTime<Utc>>,

    /// Soft-disable flag.
    pub is_active: bool,
}

impl From<&LicenseRecord> for LicenseInfo {
    fn from(record: &LicenseRecord) -> Self {
        Self {
            license_id: record.license_id.clone(),
            license_type: record.license_type,
            max_branches: record.max_branches,
            max_users: record.max_users,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            is_active: record.is_active,
        }
    }
}

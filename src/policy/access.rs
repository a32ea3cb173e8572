//! Entitlement and capacity cap enforcement.
//!
//! This module enforces access policies based on:
//! - License state (active and not expired)
//! - Branch and user caps (host supplies the live counts)

use crate::protocol::models::{is_expired, LicenseInfo};
use crate::NodelockError;
use chrono::{DateTime, Utc};

/// Resource kinds limited by a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapKind {
    /// Gym branches.
    Branches,
    /// Application users.
    Users,
}

/// Check that an entitlement still grants access at `now`.
///
/// # Returns
/// * `Ok(())` - Access granted
/// * `Err(RecordNotFound)` - License was soft-disabled
/// * `Err(Expired)` - License expired
pub fn check_access(info: &LicenseInfo, now: DateTime<Utc>) -> Result<(), NodelockError> {
    if !info.is_active {
        return Err(NodelockError::RecordNotFound);
    }

    if is_expired(info.expires_at, now) {
        // is_expired only returns true when an expiry is set
        let expires_at = info.expires_at.unwrap_or(now);
        return Err(NodelockError::Expired { expires_at });
    }

    Ok(())
}

/// Usage caps carried by an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCaps {
    /// Maximum number of branches.
    pub max_branches: u32,

    /// Maximum number of users.
    pub max_users: u32,
}

impl UsageCaps {
    /// Extract caps from an entitlement.
    pub fn from_license_info(info: &LicenseInfo) -> Self {
        Self {
            max_branches: info.max_branches,
            max_users: info.max_users,
        }
    }

    /// Cap for a resource kind.
    pub fn limit(&self, kind: CapKind) -> u32 {
        match kind {
            CapKind::Branches => self.max_branches,
            CapKind::Users => self.max_users,
        }
    }

    /// Check whether one more resource fits.
    ///
    /// # Arguments
    /// * `current_count` - How many resources the host already has
    pub fn allows_one_more(&self, kind: CapKind, current_count: u32) -> bool {
        current_count < self.limit(kind)
    }
}

/// Whether an optional entitlement allows adding one more resource.
///
/// No entitlement means no access.
pub fn can_add(info: Option<&LicenseInfo>, kind: CapKind, current_count: u32) -> bool {
    info.map(|info| UsageCaps::from_license_info(info).allows_one_more(kind, current_count))
        .unwrap_or(false)
}

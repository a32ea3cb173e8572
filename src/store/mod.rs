//! License persistence seam.
//!
//! The engine only needs one record per hardware id. Backends:
//! - [`memory::MemoryLicenseStore`] for tests and hosts without disk state
//! - [`file::FileLicenseStore`] for a JSON file under the user data dir

use crate::protocol::models::LicenseRecord;
use crate::NodelockError;
use chrono::{DateTime, Utc};

pub mod file;
pub mod memory;

pub use file::FileLicenseStore;
pub use memory::MemoryLicenseStore;

/// Storage for license records.
///
/// Implementations must reject a second record for the same hardware id
/// (`DuplicateHardwareId`) and must never let `validation_count` decrease.
pub trait LicenseStore: Send + Sync {
    /// Find the record bound to a hardware id, active or not.
    fn find_by_hardware_id(&self, hardware_id: &str)
        -> Result<Option<LicenseRecord>, NodelockError>;

    /// Find any active record (earliest issued first).
    fn find_any_active(&self) -> Result<Option<LicenseRecord>, NodelockError>;

    /// Insert a new record.
    fn insert(&self, record: LicenseRecord) -> Result<(), NodelockError>;

    /// Persist validation counters for a license.
    fn update_counters(
        &self,
        license_id: &str,
        last_validation: DateTime<Utc>,
        validation_count: u64,
    ) -> Result<(), NodelockError>;
}

/// Apply a counter update to a record, enforcing monotonicity.
pub(crate) fn apply_counters(
    record: &mut LicenseRecord,
    last_validation: DateTime<Utc>,
    validation_count: u64,
) -> Result<(), NodelockError> {
    if validation_count < record.validation_count {
        return Err(NodelockError::Store(format!(
            "validation_count cannot decrease ({} -> {})",
            record.validation_count, validation_count
        )));
    }
    record.last_validation = Some(last_validation);
    record.validation_count = validation_count;
    Ok(())
}

/// Pick the earliest-issued active record.
pub(crate) fn earliest_active<'a>(
    records: impl Iterator<Item = &'a LicenseRecord>,
) -> Option<LicenseRecord> {
    records
        .filter(|r| r.is_active)
        .min_by_key(|r| r.issued_at)
        .cloned()
}

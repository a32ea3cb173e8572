//! In-memory license store.

use crate::protocol::models::LicenseRecord;
use crate::store::{apply_counters, earliest_active, LicenseStore};
use crate::NodelockError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// License store kept in process memory, keyed by hardware id.
#[derive(Debug, Default)]
pub struct MemoryLicenseStore {
    records: RwLock<HashMap<String, LicenseRecord>>,
}

impl MemoryLicenseStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Edit a stored record in place (administrative tooling, tests).
    ///
    /// Returns `false` when no record is bound to `hardware_id`.
    pub fn modify<F>(&self, hardware_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut LicenseRecord),
    {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.get_mut(hardware_id) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }
}

impl LicenseStore for MemoryLicenseStore {
    fn find_by_hardware_id(
        &self,
        hardware_id: &str,
    ) -> Result<Option<LicenseRecord>, NodelockError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(hardware_id).cloned())
    }

    fn find_any_active(&self) -> Result<Option<LicenseRecord>, NodelockError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(earliest_active(records.values()))
    }

    fn insert(&self, record: LicenseRecord) -> Result<(), NodelockError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&record.hardware_id) {
            return Err(NodelockError::DuplicateHardwareId);
        }
        records.insert(record.hardware_id.clone(), record);
        Ok(())
    }

    fn update_counters(
        &self,
        license_id: &str,
        last_validation: DateTime<Utc>,
        validation_count: u64,
    ) -> Result<(), NodelockError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records
            .values_mut()
            .find(|r| r.license_id == license_id)
            .ok_or_else(|| NodelockError::Store(format!("Unknown license id: {}", license_id)))?;
        apply_counters(record, last_validation, validation_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::LicenseType;
    use chrono::{Duration, TimeZone};

    fn record(license_id: &str, hardware_id: &str, issued_days_ago: i64) -> LicenseRecord {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        LicenseRecord {
            license_id: license_id.to_string(),
            license_key: "sealed".to_string(),
            hardware_id: hardware_id.to_string(),
            license_type: LicenseType::Standard,
            max_branches: 1,
            max_users: 10,
            issued_at: now - Duration::days(issued_days_ago),
            expires_at: None,
            last_validation: Some(now),
            validation_count: 1,
            is_active: true,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let store = MemoryLicenseStore::new();
        store.insert(record("a", "hw-a", 1)).unwrap();
        let found = store.find_by_hardware_id("hw-a").unwrap().unwrap();
        assert_eq!(found.license_id, "a");
        assert!(store.find_by_hardware_id("hw-b").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_hardware_id_rejected() {
        let store = MemoryLicenseStore::new();
        store.insert(record("a", "hw", 1)).unwrap();
        assert_eq!(
            store.insert(record("b", "hw", 1)),
            Err(NodelockError::DuplicateHardwareId)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_find_any_active_skips_inactive() {
        let store = MemoryLicenseStore::new();
        let mut old = record("old", "hw-1", 30);
        old.is_active = false;
        store.insert(old).unwrap();
        store.insert(record("newer", "hw-2", 5)).unwrap();
        store.insert(record("older", "hw-3", 10)).unwrap();

        let active = store.find_any_active().unwrap().unwrap();
        assert_eq!(active.license_id, "older");
    }

    #[test]
    fn test_update_counters() {
        let store = MemoryLicenseStore::new();
        store.insert(record("a", "hw", 1)).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        store.update_counters("a", at, 2).unwrap();
        let found = store.find_by_hardware_id("hw").unwrap().unwrap();
        assert_eq!(found.validation_count, 2);
        assert_eq!(found.last_validation, Some(at));
    }

    #[test]
    fn test_update_counters_never_decreases() {
        let store = MemoryLicenseStore::new();
        store.insert(record("a", "hw", 1)).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        store.update_counters("a", at, 5).unwrap();

        assert!(matches!(
            store.update_counters("a", at, 4),
            Err(NodelockError::Store(_))
        ));
        assert_eq!(
            store.find_by_hardware_id("hw").unwrap().unwrap().validation_count,
            5
        );
    }

    #[test]
    fn test_update_counters_unknown_id() {
        let store = MemoryLicenseStore::new();
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            store.update_counters("missing", at, 1),
            Err(NodelockError::Store(_))
        ));
    }

    #[test]
    fn test_modify() {
        let store = MemoryLicenseStore::new();
        store.insert(record("a", "hw", 1)).unwrap();
        assert!(store.modify("hw", |r| r.is_active = false));
        assert!(!store.modify("nope", |r| r.is_active = false));
        assert!(store.find_any_active().unwrap().is_none());
    }
}

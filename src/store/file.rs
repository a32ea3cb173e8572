//! File-based license store with atomic writes.
//!
//! Stores all records in `dirs::data_dir()/<namespace>/licenses.json`.
//! Uses temp file + rename for atomic writes.

use crate::protocol::models::LicenseRecord;
use crate::store::{apply_counters, earliest_active, LicenseStore};
use crate::NodelockError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

const STORE_FILE: &str = "licenses.json";

/// On-disk document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    licenses: Vec<LicenseRecord>,
}

/// File-based license store.
pub struct FileLicenseStore {
    /// Directory holding the store file.
    store_dir: PathBuf,
    /// Serializes read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl FileLicenseStore {
    /// Create a file store with the given namespace.
    ///
    /// The store file lives under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, NodelockError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| NodelockError::Store("Could not find data directory".to_string()))?;

        Self::with_path(base_dir.join(namespace))
    }

    /// Create a file store in a specific directory.
    pub fn with_path(store_dir: PathBuf) -> Result<Self, NodelockError> {
        fs::create_dir_all(&store_dir)
            .map_err(|e| NodelockError::Store(format!("Failed to create store dir: {}", e)))?;
        Ok(Self {
            store_dir,
            lock: Mutex::new(()),
        })
    }

    /// Path of the store file.
    pub fn path(&self) -> PathBuf {
        self.store_dir.join(STORE_FILE)
    }

    fn load(&self) -> Result<StoreFile, NodelockError> {
        let path = self.path();

        if !path.exists() {
            return Ok(StoreFile::default());
        }

        let json = fs::read_to_string(&path)
            .map_err(|e| NodelockError::Store(format!("Failed to read store file: {}", e)))?;

        serde_json::from_str(&json)
            .map_err(|e| NodelockError::Store(format!("Failed to parse store file: {}", e)))
    }

    fn save(&self, doc: &StoreFile) -> Result<(), NodelockError> {
        let target_path = self.path();
        let temp_path = self.store_dir.join(format!("{}.tmp", STORE_FILE));

        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| NodelockError::Store(format!("Failed to serialize store: {}", e)))?;

        fs::write(&temp_path, &json)
            .map_err(|e| NodelockError::Store(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, &target_path)
            .map_err(|e| NodelockError::Store(format!("Failed to rename store file: {}", e)))?;

        Ok(())
    }
}

impl LicenseStore for FileLicenseStore {
    fn find_by_hardware_id(
        &self,
        hardware_id: &str,
    ) -> Result<Option<LicenseRecord>, NodelockError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = self.load()?;
        Ok(doc
            .licenses
            .into_iter()
            .find(|r| r.hardware_id == hardware_id))
    }

    fn find_any_active(&self) -> Result<Option<LicenseRecord>, NodelockError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = self.load()?;
        Ok(earliest_active(doc.licenses.iter()))
    }

    fn insert(&self, record: LicenseRecord) -> Result<(), NodelockError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.load()?;
        if doc
            .licenses
            .iter()
            .any(|r| r.hardware_id == record.hardware_id)
        {
            return Err(NodelockError::DuplicateHardwareId);
        }
        doc.licenses.push(record);
        self.save(&doc)
    }

    fn update_counters(
        &self,
        license_id: &str,
        last_validation: DateTime<Utc>,
        validation_count: u64,
    ) -> Result<(), NodelockError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.load()?;
        let record = doc
            .licenses
            .iter_mut()
            .find(|r| r.license_id == license_id)
            .ok_or_else(|| NodelockError::Store(format!("Unknown license id: {}", license_id)))?;
        apply_counters(record, last_validation, validation_count)?;
        self.save(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::LicenseType;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn make_test_record(license_id: &str, hardware_id: &str) -> LicenseRecord {
        LicenseRecord {
            license_id: license_id.to_string(),
            license_key: "c2VhbGVk".to_string(),
            hardware_id: hardware_id.to_string(),
            license_type: LicenseType::Trial,
            max_branches: 1,
            max_users: 3,
            issued_at: Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
            expires_at: Some(Utc.with_ymd_and_hms(2025, 2, 14, 12, 0, 0).unwrap()),
            last_validation: None,
            validation_count: 1,
            is_active: true,
        }
    }

    #[test]
    fn test_file_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLicenseStore::with_path(temp_dir.path().to_path_buf()).unwrap();

        let record = make_test_record("lic-1", "hw-1");
        store.insert(record.clone()).unwrap();

        let loaded = store.find_by_hardware_id("hw-1").unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[test]
    fn test_file_store_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLicenseStore::with_path(temp_dir.path().to_path_buf()).unwrap();

        assert!(store.find_by_hardware_id("nothing").unwrap().is_none());
        assert!(store.find_any_active().unwrap().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = FileLicenseStore::with_path(temp_dir.path().to_path_buf()).unwrap();
            store.insert(make_test_record("lic-1", "hw-1")).unwrap();
        }
        let reopened = FileLicenseStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(
            reopened.find_any_active().unwrap().map(|r| r.license_id),
            Some("lic-1".to_string())
        );
    }

    #[test]
    fn test_file_store_duplicate_hardware_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLicenseStore::with_path(temp_dir.path().to_path_buf()).unwrap();

        store.insert(make_test_record("lic-1", "hw-1")).unwrap();
        assert_eq!(
            store.insert(make_test_record("lic-2", "hw-1")),
            Err(NodelockError::DuplicateHardwareId)
        );
    }

    #[test]
    fn test_file_store_update_counters() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLicenseStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        store.insert(make_test_record("lic-1", "hw-1")).unwrap();

        let at = Utc.with_ymd_and_hms(2025, 1, 20, 8, 0, 0).unwrap();
        store.update_counters("lic-1", at, 2).unwrap();

        let loaded = store.find_by_hardware_id("hw-1").unwrap().unwrap();
        assert_eq!(loaded.validation_count, 2);
        assert_eq!(loaded.last_validation, Some(at));

        assert!(matches!(
            store.update_counters("lic-1", at, 1),
            Err(NodelockError::Store(_))
        ));
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLicenseStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(
            store.find_by_hardware_id("hw-1"),
            Err(NodelockError::Store(_))
        ));
    }

    #[test]
    fn test_file_store_no_temp_file_left() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLicenseStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        store.insert(make_test_record("lic-1", "hw-1")).unwrap();

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

//! Key-value persistence for calculation history.
//!
//! Each list is stored as a JSON array under a single key. Updates are plain
//! read-modify-write cycles with no locking: concurrent writers race and the
//! last write wins.

use crate::{error::RadwasteError, history::next_record_id};
use chrono::{DateTime, Utc};
use radwaste_schemas::history::{HistoryRecord, RecordId};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

pub const HISTORY_KEY_PREFIX: &str = "radioactive_calc_history";
pub const SHARED_HISTORY_KEY: &str = "radioactive_calc_shared";

/// Opaque string storage the history repository writes through.
pub trait KeyValueStore {
    /// # Errors
    ///
    /// Returns `RadwasteError::KeyNotFound` when nothing is stored under `key`.
    fn get(&self, key: &str) -> Result<String, RadwasteError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), RadwasteError>;
    fn delete(&mut self, key: &str) -> Result<(), RadwasteError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<String, RadwasteError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| RadwasteError::KeyNotFound(key.to_string()))
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), RadwasteError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), RadwasteError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A store backed by one JSON object file, rewritten in full on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty if the file does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RadwasteError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| RadwasteError::FileIO(path.display().to_string(), e))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            log::info!("Store file '{}' does not exist yet; starting empty", path.display());
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` to disk. Callers commit them to `self.entries` only once this succeeds.
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), RadwasteError> {
        let path_str = self.path.display().to_string();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RadwasteError::FileIO(path_str.clone(), e))?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content).map_err(|e| RadwasteError::FileIO(path_str, e))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<String, RadwasteError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| RadwasteError::KeyNotFound(key.to_string()))
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), RadwasteError> {
        let mut entries = self.entries.clone();
        entries.insert(key.to_string(), value);
        self.flush(&entries)?;
        self.entries = entries;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), RadwasteError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut entries = self.entries.clone();
        entries.remove(key);
        self.flush(&entries)?;
        self.entries = entries;
        Ok(())
    }
}

pub fn personal_history_key(username: &str) -> String {
    format!("{}_{}", HISTORY_KEY_PREFIX, username)
}

/// The personal and shared history lists, newest record first.
///
/// The two lists are separate collections: a record appended to both is stored
/// twice, and deleting it from one list leaves the other copy in place.
pub struct HistoryRepository<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> HistoryRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn personal(&self, username: &str) -> Result<Vec<HistoryRecord>, RadwasteError> {
        self.load(&personal_history_key(username))
    }

    pub fn shared(&self) -> Result<Vec<HistoryRecord>, RadwasteError> {
        self.load(SHARED_HISTORY_KEY)
    }

    /// An id for a record created at `created_at` that is unique in both lists `username` writes to.
    pub fn next_id(&self, username: &str, created_at: DateTime<Utc>) -> Result<RecordId, RadwasteError> {
        let newest = self
            .personal(username)?
            .iter()
            .chain(self.shared()?.iter())
            .map(|r| r.id)
            .max();
        Ok(next_record_id(created_at, newest))
    }

    pub fn append_personal(&mut self, username: &str, record: HistoryRecord) -> Result<(), RadwasteError> {
        self.prepend(&personal_history_key(username), record)
    }

    pub fn append_shared(&mut self, record: HistoryRecord) -> Result<(), RadwasteError> {
        self.prepend(SHARED_HISTORY_KEY, record)
    }

    /// Writes `record` to its creator's personal list, then a copy to the shared list.
    pub fn record(&mut self, record: HistoryRecord) -> Result<(), RadwasteError> {
        let username = record.created_by.clone();
        self.append_personal(&username, record.clone())?;
        self.append_shared(record)
    }

    /// Returns `false` if no record with `id` was in the list.
    pub fn delete_personal(&mut self, username: &str, id: RecordId) -> Result<bool, RadwasteError> {
        self.remove(&personal_history_key(username), id)
    }

    pub fn delete_shared(&mut self, id: RecordId) -> Result<bool, RadwasteError> {
        self.remove(SHARED_HISTORY_KEY, id)
    }

    fn load(&self, key: &str) -> Result<Vec<HistoryRecord>, RadwasteError> {
        match self.store.get(key) {
            Ok(value) => Ok(serde_json::from_str(&value)?),
            Err(RadwasteError::KeyNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn save(&mut self, key: &str, records: &[HistoryRecord]) -> Result<(), RadwasteError> {
        let value = serde_json::to_string(records)?;
        self.store.set(key, value)
    }

    fn prepend(&mut self, key: &str, record: HistoryRecord) -> Result<(), RadwasteError> {
        let mut records = self.load(key)?;
        log::debug!("Appending record {} to '{}' ({} existing)", record.id, key, records.len());
        records.insert(0, record);
        self.save(key, &records)
    }

    fn remove(&mut self, key: &str, id: RecordId) -> Result<bool, RadwasteError> {
        let records = self.load(key)?;
        let before = records.len();
        let filtered: Vec<HistoryRecord> = records.into_iter().filter(|r| r.id != id).collect();
        if filtered.len() == before {
            log::warn!("Record {} not found under '{}'", id, key);
            return Ok(false);
        }
        self.save(key, &filtered)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_get_set_delete() {
        let mut store = MemoryStore::new();
        assert!(matches!(store.get("k"), Err(RadwasteError::KeyNotFound(k)) if k == "k"));
        store.set("k", "v".to_string()).unwrap();
        assert_eq!(store.get("k").unwrap(), "v");
        store.delete("k").unwrap();
        assert!(store.get("k").is_err());
        store.delete("k").unwrap();
    }

    #[test]
    fn json_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("a", "1".to_string()).unwrap();
        store.set("b", "2".to_string()).unwrap();
        store.delete("a").unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(reopened.get("a").is_err());
        assert_eq!(reopened.get("b").unwrap(), "2");
    }

    #[test]
    fn json_file_store_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut first = JsonFileStore::open(&path).unwrap();
        let mut second = JsonFileStore::open(&path).unwrap();
        first.set("k", "first".to_string()).unwrap();
        second.set("other", "second".to_string()).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(reopened.get("k").is_err());
        assert_eq!(reopened.get("other").unwrap(), "second");
    }

    #[test]
    fn failed_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("kept", "1".to_string()).unwrap();

        // A directory where the file should be makes every rewrite fail.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(matches!(store.set("k", "v".to_string()), Err(RadwasteError::FileIO(..))));
        assert!(matches!(store.get("k"), Err(RadwasteError::KeyNotFound(_))));
        assert!(store.delete("kept").is_err());
        assert_eq!(store.get("kept").unwrap(), "1");
    }

    #[test]
    fn stored_records_read_back_bit_for_bit() {
        use crate::{compute_result, history::assemble_record, IsotopeTable, MeasurementBuilder};
        use chrono::{Duration, TimeZone};

        let table = IsotopeTable::builtin();
        let isotope = table.lookup("i131").unwrap();
        let measured_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let input = MeasurementBuilder::new()
            .with_isotope(isotope)
            .with_distance_m(0.37)
            .with_dose_rate(0.123456789)
            .with_mass_g(987.654321)
            .measured_at(measured_at)
            .target_at(measured_at + Duration::milliseconds(123_456_789))
            .build()
            .unwrap();
        let calc = compute_result(&input, &table).unwrap();
        let record = assemble_record(1, "alice", measured_at, Some("Drum 1"), "Sample", isotope, &input, &calc);

        let mut repo = HistoryRepository::new(MemoryStore::new());
        repo.record(record.clone()).unwrap();
        assert_eq!(repo.personal("alice").unwrap(), vec![record.clone()]);
        assert_eq!(repo.shared().unwrap(), vec![record]);
    }

    #[test]
    fn personal_keys_are_namespaced_by_user() {
        assert_eq!(personal_history_key("alice"), "radioactive_calc_history_alice");
    }

    #[test]
    fn missing_lists_load_empty() {
        let repo = HistoryRepository::new(MemoryStore::new());
        assert!(repo.personal("nobody").unwrap().is_empty());
        assert!(repo.shared().unwrap().is_empty());
    }
}

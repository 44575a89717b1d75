//! Durable snapshot of the lookup table
//!
//! Provides a `DurableStore` that keeps the last successfully fetched row set,
//! with its fingerprint and write time, in a single JSON file. The snapshot
//! only seeds a freshly started process; it is never the source of truth while
//! the process is warm.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data::{Fingerprint, Row};

/// Errors that can occur when writing the snapshot
#[derive(Debug, Error)]
pub enum StoreError {
    /// Directory creation, write or rename failed
    #[error("Failed to write snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Record could not be serialized
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The persisted snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Fingerprint of `rows`
    pub fingerprint: Fingerprint,
    /// Rows in fetch order, duplicates included
    pub rows: Vec<Row>,
    /// When the snapshot was written
    pub written_at: DateTime<Utc>,
}

impl CacheRecord {
    /// Creates a record stamped with the current time
    pub fn new(fingerprint: Fingerprint, rows: Vec<Row>) -> Self {
        Self {
            fingerprint,
            rows,
            written_at: Utc::now(),
        }
    }
}

/// Reads and writes the snapshot file
///
/// The file lives at `<dir>/lookup_table_<service>.json`, so that restarts of
/// the same service find the snapshot written by the previous process.
#[derive(Debug, Clone)]
pub struct DurableStore {
    /// Location of the snapshot file
    path: PathBuf,
}

impl DurableStore {
    /// Creates a store for the given directory and service name
    ///
    /// # Arguments
    /// * `dir` - Directory holding the snapshot; created on first save
    /// * `service_name` - Distinguishes snapshots of services sharing `dir`
    pub fn new(dir: &Path, service_name: &str) -> Self {
        Self {
            path: dir.join(format!("lookup_table_{}.json", service_name)),
        }
    }

    /// Creates a store backed by an explicit file path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot
    ///
    /// Returns `None` if the file doesn't exist, cannot be parsed, or its
    /// fingerprint doesn't match its rows. A bad snapshot is treated exactly
    /// like a missing one.
    ///
    /// # Returns
    /// * `Some(CacheRecord)` if a valid snapshot exists
    /// * `None` otherwise
    pub fn load(&self) -> Option<CacheRecord> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "snapshot unreadable");
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_slice(&content) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "snapshot corrupt, ignoring");
                return None;
            }
        };

        if Fingerprint::of_rows(&record.rows) != record.fingerprint {
            tracing::warn!(
                path = %self.path.display(),
                "snapshot fingerprint does not match its rows, ignoring"
            );
            return None;
        }

        Some(record)
    }

    /// Overwrites the snapshot
    ///
    /// Writes to a temporary sibling and renames it into place, so a crash
    /// mid-write never leaves a truncated snapshot behind.
    pub fn save(&self, record: &CacheRecord) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record)?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (DurableStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = DurableStore::new(temp_dir.path(), "test");
        (store, temp_dir)
    }

    fn sample_record() -> CacheRecord {
        let rows = vec![
            Row::new("US", "NY1", "LE-US"),
            Row::new("FR", "PAR", "LE-FR"),
            Row::new("US", "CHI", "LE-US2"),
        ];
        CacheRecord::new(Fingerprint::of_rows(&rows), rows)
    }

    #[test]
    fn test_path_uses_service_name() {
        let store = DurableStore::new(Path::new("/var/cache"), "billing");
        assert_eq!(store.path(), Path::new("/var/cache/lookup_table_billing.json"));
    }

    #[test]
    fn test_load_returns_none_for_missing_file() {
        let (store, _temp_dir) = create_test_store();

        assert!(store.load().is_none(), "Should return None for missing file");
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (store, _temp_dir) = create_test_store();
        let record = sample_record();

        store.save(&record).expect("Save should succeed");
        let loaded = store.load().expect("Should load saved snapshot");

        assert_eq!(loaded.rows, record.rows);
        assert_eq!(loaded.fingerprint, record.fingerprint);
        assert_eq!(loaded.written_at, record.written_at);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let (store, temp_dir) = create_test_store();

        store.save(&sample_record()).expect("Save should succeed");

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["lookup_table_test.json"]);
    }

    #[test]
    fn test_save_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested = temp_dir.path().join("nested").join("cache");
        let store = DurableStore::new(&nested, "svc");

        store.save(&sample_record()).expect("Save should succeed");

        assert!(nested.join("lookup_table_svc.json").exists());
    }

    #[test]
    fn test_load_corrupt_file_returns_none() {
        let (store, _temp_dir) = create_test_store();
        fs::write(store.path(), "{not json").unwrap();

        assert!(store.load().is_none(), "Corrupt snapshot should load as None");
    }

    #[test]
    fn test_load_tampered_rows_returns_none() {
        let (store, _temp_dir) = create_test_store();
        let mut record = sample_record();
        record.rows.pop();
        store.save(&record).unwrap();

        assert!(store.load().is_none(), "Fingerprint mismatch should load as None");
    }

    #[test]
    fn test_overwrite_existing_snapshot() {
        let (store, _temp_dir) = create_test_store();
        let first = sample_record();
        let rows = vec![Row::new("DE", "FRA", "LV-9")];
        let second = CacheRecord::new(Fingerprint::of_rows(&rows), rows);

        store.save(&first).unwrap();
        store.save(&second).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.fingerprint, second.fingerprint);
        assert_eq!(loaded.rows, second.rows);
    }

    #[test]
    fn test_save_into_unwritable_location_reports_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // Parent "directory" is a regular file.
        let store = DurableStore::with_path(blocker.join("lookup_table.json"));

        let err = store.save(&sample_record()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}

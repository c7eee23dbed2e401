//! Snapshot persistence
//!
//! A snapshot is the whole entry map plus the expiration schedule, written as
//! JSON. Writes go to a `.tmp` sibling that is fsynced and then renamed over
//! the target, so the canonical path only ever holds a complete snapshot.

use crate::StorageError;
use crate::storage::entry::Entry;
use crate::storage::schedule::ExpiryRecord;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Format version written into every snapshot
pub const SNAPSHOT_VERSION: u32 = 2;

/// Serialized store state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Unix milliseconds at save time
    pub saved_at: u64,
    /// Entries, least recently used first
    pub entries: Vec<(String, Entry)>,
    pub schedule: Vec<ExpiryRecord>,
}

impl Snapshot {
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(self).map_err(|e| StorageError::Encoding(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        let snapshot: Self =
            serde_json::from_slice(bytes).map_err(|e| StorageError::Decoding(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StorageError::Decoding(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        Ok(snapshot)
    }
}

/// Sibling path used while a snapshot is being written
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("snapshot"), OsString::from);
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write bytes to `path` through a temp file and an atomic rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    Ok(result?)
}

/// Read a snapshot, returning `None` when the file does not exist
pub fn read(path: &Path) -> Result<Option<Snapshot>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Snapshot::decode(&bytes).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let entries = vec![
            ("a".to_string(), Entry::new("1".to_string())),
            (
                "b".to_string(),
                Entry {
                    value: "two".to_string(),
                    expires_at: Some(5_000),
                },
            ),
        ];
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: 1_000,
            entries,
            schedule: vec![ExpiryRecord {
                expires_at: 5_000,
                key: "b".to_string(),
            }],
        }
    }

    #[test]
    fn test_temp_path_is_sibling() {
        assert_eq!(
            temp_path(Path::new("/data/dump.rdb")),
            PathBuf::from("/data/dump.rdb.tmp")
        );
        assert_eq!(temp_path(Path::new("dump.rdb")), PathBuf::from("dump.rdb.tmp"));
    }

    #[test]
    fn test_write_then_read() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("dump.rdb");

        let snapshot = sample();
        write_atomic(&path, &snapshot.encode().unwrap()).unwrap();

        assert!(!temp_path(&path).exists());
        assert_eq!(read(&path).unwrap(), Some(snapshot));
    }

    #[test]
    fn test_write_replaces_existing() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("dump.rdb");
        fs::write(&path, b"stale").unwrap();

        write_atomic(&path, &sample().encode().unwrap()).unwrap();
        assert!(read(&path).unwrap().is_some());
    }

    #[test]
    fn test_creates_parent_dirs() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("nested/dir/dump.rdb");
        write_atomic(&path, &sample().encode().unwrap()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_missing_file() {
        let tmp_dir = TempDir::new().unwrap();
        assert_eq!(read(&tmp_dir.path().join("absent.rdb")).unwrap(), None);
    }

    #[test]
    fn test_corrupt_file() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("dump.rdb");
        fs::write(&path, b"{\"version\":2,\"entries\":").unwrap();
        assert!(matches!(read(&path), Err(StorageError::Decoding(_))));
    }

    #[test]
    fn test_unknown_version() {
        let mut snapshot = sample();
        snapshot.version = 99;
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        assert!(matches!(
            Snapshot::decode(&bytes),
            Err(StorageError::Decoding(_))
        ));
    }
}

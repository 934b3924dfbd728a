//! Durable key-value storage for the board.
//!
//! The board is persisted as two JSON values under well-known keys, mirroring
//! how a browser page keeps state in local storage. `FileStore` keeps one file
//! per key and replaces it atomically; `MemoryStore` backs tests.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Key holding the ordered column-name array.
pub const COLUMNS_KEY: &str = "columns";
/// Key holding the column-name → task-list mapping.
pub const TASKS_KEY: &str = "tasks";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode board: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Filesystem store: `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir) {
                if let Err(err) = d.sync_all() {
                    log::warn!("[taskurai.storage] fsync of {} failed: {}", dir.display(), err);
                }
            }
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        Self::atomic_write(&path, value)?;
        log::debug!("[taskurai.storage] wrote {} ({} bytes)", path.display(), value.len());
        Ok(())
    }
}

/// In-memory store. Writes can be made to fail, for all keys or a single one.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    fail_writes: bool,
    failing_key: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fail_writes: false,
            failing_key: None,
        }
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Makes writes to `key` fail while other keys keep working.
    pub fn fail_writes_to(&mut self, key: Option<&str>) {
        self.failing_key = key.map(str::to_string);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes || self.failing_key.as_deref() == Some(key) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "write rejected",
            )));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_missing_key() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get(COLUMNS_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_set_and_get() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path().join("nested")).unwrap();
        store.set(TASKS_KEY, r#"{"To Do":[]}"#).unwrap();
        store.set(TASKS_KEY, r#"{"Done":[]}"#).unwrap();

        assert_eq!(store.get(TASKS_KEY).unwrap().as_deref(), Some(r#"{"Done":[]}"#));
        assert!(dir.path().join("nested").join("tasks.json").exists());
        assert!(!dir.path().join("nested").join("tasks.json.tmp").exists());
    }

    #[test]
    fn test_memory_store_failing_writes() {
        let mut store = MemoryStore::with_values([(COLUMNS_KEY, "[]")]);
        store.set_fail_writes(true);
        assert!(store.set(COLUMNS_KEY, r#"["A"]"#).is_err());
        assert_eq!(store.raw(COLUMNS_KEY), Some("[]"));
    }

    #[test]
    fn test_memory_store_single_failing_key() {
        let mut store = MemoryStore::new();
        store.fail_writes_to(Some(COLUMNS_KEY));
        assert!(store.set(COLUMNS_KEY, "[]").is_err());
        store.set(TASKS_KEY, "{}").unwrap();
        assert_eq!(store.raw(TASKS_KEY), Some("{}"));
    }
}

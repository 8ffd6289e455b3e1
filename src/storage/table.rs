//! Options tables backing the KV store.

use crate::error::{Result, SyncError};
use crate::fs::atomic_write_file;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A flat string-to-string table shared by many processes.
///
/// No atomicity is promised across calls; a table may be slow and
/// eventually consistent.
pub trait OptionsTable: Send + Sync {
    /// Fetch the value at `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` at `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`.
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-process table, shareable across threads by cloning.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl OptionsTable for MemoryTable {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Durable table stored as one JSON object in a shared file.
///
/// Every `set`/`delete` reads the whole object, edits it, and atomically
/// replaces the file. Two processes editing different keys at the same
/// moment can lose one of the edits; callers of the lock protocol already
/// tolerate lost writes.
#[derive(Debug, Clone)]
pub struct JsonOptionsTable {
    path: PathBuf,
}

impl JsonOptionsTable {
    /// Create a table persisted at `path`. The file is created on first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(SyncError::Storage(format!(
                    "failed to read options table '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            SyncError::Storage(format!(
                "failed to parse options table '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).map_err(|e| {
            SyncError::Storage(format!("failed to serialize options table: {}", e))
        })?;
        atomic_write_file(&self.path, &json)
    }
}

impl OptionsTable for JsonOptionsTable {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.store(&entries)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.store(&entries)?;
        }
        Ok(())
    }
}

//! Filesystem backend: one regular file per key.

use super::{BackendKind, StorageBackend, StorageScope};
use crate::error::{Result, SyncError};
use crate::fs::atomic_write_file;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Lock records kept as files in a shared directory.
///
/// The filesystem has no tenant distinction, so `scope` is ignored.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `key`.
    pub fn record_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.contains(['/', '\\'])
            || key == "."
            || key == ".."
            || key.starts_with('.')
        {
            return Err(SyncError::Storage(format!(
                "key '{}' cannot be used as a file name",
                key
            )));
        }
        Ok(self.dir.join(key))
    }
}

impl StorageBackend for FileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn read(&self, key: &str, _scope: StorageScope) -> Result<String> {
        let path = self.record_path(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "unreadable record treated as empty");
                Ok(String::new())
            }
        }
    }

    fn write(&self, key: &str, value: &str, _scope: StorageScope) -> Result<()> {
        atomic_write_file(self.record_path(key)?, value)
    }

    fn delete(&self, key: &str, _scope: StorageScope) -> Result<()> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Storage(format!(
                "failed to delete '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}

//! State-root resolution for synclock.
//!
//! Every process that shares a lock namespace must agree on one state root:
//! a directory on the shared filesystem holding the KV tables, the FileStore
//! records, the backend mode markers, and the diagnostics log. This module
//! turns that root into the concrete paths the other modules use.

use crate::error::{Result, SyncError};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the state root.
pub const STATE_ROOT_ENV: &str = "SYNCLOCK_HOME";

/// State root used when neither a flag nor the environment names one.
pub const DEFAULT_STATE_ROOT: &str = ".synclock";

/// Config filename within the state root.
pub const CONFIG_FILENAME: &str = "synclock.yaml";

/// Resolved paths for one synclock state root. All paths are absolute.
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// The state root itself.
    pub root: PathBuf,

    /// KV table directory (`{root}/kv/`).
    pub kv_dir: PathBuf,

    /// FileStore record directory (`{root}/files/`).
    pub files_dir: PathBuf,

    /// Backend mode marker directory (`{root}/markers/`).
    pub markers_dir: PathBuf,

    /// Diagnostics log directory (`{root}/events/`).
    pub events_dir: PathBuf,
}

impl SyncContext {
    /// Resolve the state root from an explicit path, `SYNCLOCK_HOME`, or the default.
    ///
    /// Relative roots are anchored at the current working directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => match env::var_os(STATE_ROOT_ENV) {
                Some(value) if !value.is_empty() => PathBuf::from(value),
                _ => PathBuf::from(DEFAULT_STATE_ROOT),
            },
        };

        let root = if root.is_absolute() {
            root
        } else {
            let cwd = env::current_dir().map_err(|e| {
                SyncError::User(format!("failed to get current working directory: {}", e))
            })?;
            cwd.join(root)
        };

        Ok(Self::at(root))
    }

    /// Build the layout for a known absolute root.
    pub fn at<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            kv_dir: root.join("kv"),
            files_dir: root.join("files"),
            markers_dir: root.join("markers"),
            events_dir: root.join("events"),
            root,
        }
    }

    /// Path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }

    /// Path to the NDJSON diagnostics log.
    pub fn diagnostics_path(&self) -> PathBuf {
        self.events_dir.join("diagnostics.ndjson")
    }

    /// Create the state root directories if they do not exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.root,
            &self.kv_dir,
            &self.files_dir,
            &self.markers_dir,
            &self.events_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| {
                SyncError::Storage(format!(
                    "failed to create directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_layout_under_root() {
        let ctx = SyncContext::at("/srv/shared/locks");

        assert_eq!(ctx.kv_dir, PathBuf::from("/srv/shared/locks/kv"));
        assert_eq!(ctx.files_dir, PathBuf::from("/srv/shared/locks/files"));
        assert_eq!(ctx.markers_dir, PathBuf::from("/srv/shared/locks/markers"));
        assert_eq!(
            ctx.config_path(),
            PathBuf::from("/srv/shared/locks/synclock.yaml")
        );
        assert_eq!(
            ctx.diagnostics_path(),
            PathBuf::from("/srv/shared/locks/events/diagnostics.ndjson")
        );
    }

    #[test]
    fn test_explicit_root_wins() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = SyncContext::resolve(Some(temp_dir.path())).unwrap();
        assert_eq!(ctx.root, temp_dir.path());
    }

    #[test]
    #[serial]
    fn test_env_root_used_without_flag() {
        let temp_dir = TempDir::new().unwrap();
        // SAFETY: serialized with other tests touching the environment.
        unsafe { env::set_var(STATE_ROOT_ENV, temp_dir.path()) };
        let ctx = SyncContext::resolve(None).unwrap();
        unsafe { env::remove_var(STATE_ROOT_ENV) };

        assert_eq!(ctx.root, temp_dir.path());
    }

    #[test]
    #[serial]
    fn test_default_root_is_relative_to_cwd() {
        unsafe { env::remove_var(STATE_ROOT_ENV) };
        let ctx = SyncContext::resolve(None).unwrap();

        assert!(ctx.root.is_absolute());
        assert!(ctx.root.ends_with(DEFAULT_STATE_ROOT));
    }

    #[test]
    fn test_ensure_dirs_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = SyncContext::at(temp_dir.path().join("state"));

        ctx.ensure_dirs().unwrap();

        assert!(ctx.kv_dir.is_dir());
        assert!(ctx.files_dir.is_dir());
        assert!(ctx.markers_dir.is_dir());
        assert!(ctx.events_dir.is_dir());
    }
}

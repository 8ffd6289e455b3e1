//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{Result, SyncError};
use crate::fs::atomic_write_file;
use globset::Glob;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9_.-]*$").expect("prefix pattern is valid"));

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the synclock.yaml file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(SyncError::Config)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, or return defaults when the file is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| SyncError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| SyncError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Write the config to `path` atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        atomic_write_file(path, &self.to_yaml()?)
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `key_prefix` and `sync_namespace` must be non-empty and filename-safe,
    ///   with no leading `.` (record files with a leading dot are refused)
    /// - both delays and `reclaim_every_iterations` must be positive
    /// - `default_execution_limit_secs` must be at least 1
    /// - every `network_wide_keys` entry must be a valid glob
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("key_prefix", &self.key_prefix),
            ("sync_namespace", &self.sync_namespace),
        ] {
            if !PREFIX_PATTERN.is_match(value) {
                return Err(SyncError::Config(format!(
                    "config validation failed: {} must be non-empty, use only [A-Za-z0-9_.-], and not start with '.' (found '{}')",
                    name, value
                )));
            }
        }

        if self.try_acquire_delay_ms == 0 {
            return Err(SyncError::Config(
                "config validation failed: try_acquire_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.wait_poll_delay_ms == 0 {
            return Err(SyncError::Config(
                "config validation failed: wait_poll_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.reclaim_every_iterations == 0 {
            return Err(SyncError::Config(
                "config validation failed: reclaim_every_iterations must be greater than 0"
                    .to_string(),
            ));
        }

        if self.default_execution_limit_secs == 0 {
            return Err(SyncError::Config(
                "config validation failed: default_execution_limit_secs must be at least 1"
                    .to_string(),
            ));
        }

        for pattern in &self.network_wide_keys {
            Glob::new(pattern).map_err(|e| {
                SyncError::Config(format!(
                    "config validation failed: invalid network_wide_keys pattern '{}': {}",
                    pattern, e
                ))
            })?;
        }

        Ok(())
    }

    /// Delay between write and verify in `try_acquire`.
    pub fn try_acquire_delay(&self) -> Duration {
        Duration::from_millis(self.try_acquire_delay_ms)
    }

    /// Delay between polling rounds in `acquire_with_wait`.
    pub fn wait_poll_delay(&self) -> Duration {
        Duration::from_millis(self.wait_poll_delay_ms)
    }
}

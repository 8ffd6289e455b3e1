//! Routing of lock keys to tenant-local or network-wide storage.
//!
//! Keys matching the network-wide allow-list coordinate resources shared by
//! every tenant (a background rebuild, for instance). They go to the
//! network-wide KV table, but only when the installation is activated
//! network-wide; otherwise every key is tenant-local. The FileStore has no
//! scopes and ignores the decision.

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::platform::Platform;
use crate::storage::StorageScope;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Decides the storage scope of each logical key.
#[derive(Debug, Clone)]
pub struct ScopeRouter {
    network_keys: GlobSet,
    network_activated: bool,
}

impl ScopeRouter {
    /// Build a router from glob patterns of network-wide keys.
    pub fn new<S: AsRef<str>>(patterns: &[S], network_activated: bool) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_ref()).map_err(|e| {
                SyncError::Config(format!(
                    "invalid network-wide key pattern '{}': {}",
                    pattern.as_ref(),
                    e
                ))
            })?;
            builder.add(glob);
        }
        let network_keys = builder
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build key patterns: {}", e)))?;

        Ok(Self {
            network_keys,
            network_activated,
        })
    }

    /// Build a router from config, asking the platform about network activation.
    pub fn from_config(config: &Config, platform: &dyn Platform) -> Result<Self> {
        Self::new(&config.network_wide_keys, platform.is_network_activated())
    }

    /// Scope for `logical_key`.
    pub fn scope_for(&self, logical_key: &str) -> StorageScope {
        if self.network_activated && self.network_keys.is_match(logical_key) {
            StorageScope::Network
        } else {
            StorageScope::Local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ConfigPlatform;

    #[test]
    fn test_listed_key_is_network_when_activated() {
        let router = ScopeRouter::new(&["rebuild"], true).unwrap();
        assert_eq!(router.scope_for("rebuild"), StorageScope::Network);
        assert_eq!(router.scope_for("import"), StorageScope::Local);
    }

    #[test]
    fn test_everything_local_without_network_activation() {
        let router = ScopeRouter::new(&["rebuild"], false).unwrap();
        assert_eq!(router.scope_for("rebuild"), StorageScope::Local);
    }

    #[test]
    fn test_glob_patterns() {
        let router = ScopeRouter::new(&["index-*"], true).unwrap();
        assert_eq!(router.scope_for("index-posts"), StorageScope::Network);
        assert_eq!(router.scope_for("reindex"), StorageScope::Local);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(ScopeRouter::new(&["a[".to_string()], true).is_err());
    }

    #[test]
    fn test_from_config_uses_platform() {
        let config = Config::default();
        let platform = ConfigPlatform {
            max_execution_time_secs: None,
            network_activated: true,
        };
        let router = ScopeRouter::from_config(&config, &platform).unwrap();
        assert_eq!(router.scope_for("rebuild"), StorageScope::Network);
    }
}

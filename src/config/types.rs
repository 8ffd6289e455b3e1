//! Configuration types and defaults for synclock.
//!
//! This module defines enums, constants, and default value functions
//! used by the Config struct.

use serde::{Deserialize, Serialize};

/// Where lock diagnostics are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticsMode {
    /// Emit through `tracing` only (default).
    #[default]
    Tracing,
    /// Append NDJSON lines to `events/diagnostics.ndjson` only.
    Ndjson,
    /// Both of the above.
    Both,
}

/// Default allow-list of keys routed to network-wide storage.
pub fn default_network_wide_keys() -> Vec<String> {
    vec!["rebuild".to_string()]
}

// Default value functions for serde
pub(crate) fn default_key_prefix() -> String {
    "synclock_".to_string()
}
pub(crate) fn default_sync_namespace() -> String {
    "sync_".to_string()
}
pub(crate) fn default_try_acquire_delay_ms() -> u64 {
    50
}
pub(crate) fn default_wait_poll_delay_ms() -> u64 {
    300
}
pub(crate) fn default_reclaim_every_iterations() -> u32 {
    500
}
pub(crate) fn default_execution_limit_secs() -> u64 {
    60
}

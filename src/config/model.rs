//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for a synclock deployment.
///
/// This struct represents the contents of `synclock.yaml` under the state root.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Key settings
    // =========================================================================
    /// Prefix identifying this installation's keys in shared storage.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Prefix separating lock records from other records under `key_prefix`.
    #[serde(default = "default_sync_namespace")]
    pub sync_namespace: String,

    // =========================================================================
    // Protocol timing
    // =========================================================================
    /// Delay between writing a token and re-reading it in `try_acquire`.
    #[serde(default = "default_try_acquire_delay_ms")]
    pub try_acquire_delay_ms: u64,

    /// Delay between polling rounds in `acquire_with_wait`.
    #[serde(default = "default_wait_poll_delay_ms")]
    pub wait_poll_delay_ms: u64,

    /// How many polling rounds pass between extra staleness checks while waiting.
    #[serde(default = "default_reclaim_every_iterations")]
    pub reclaim_every_iterations: u32,

    // =========================================================================
    // Platform settings
    // =========================================================================
    /// Maximum single-request execution time reported by the host platform.
    /// Unset or below one second falls back to `default_execution_limit_secs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_execution_time_secs: Option<f64>,

    /// Execution limit assumed when the platform does not report one.
    #[serde(default = "default_execution_limit_secs")]
    pub default_execution_limit_secs: u64,

    /// Whether the installation is activated network-wide across tenants.
    #[serde(default)]
    pub network_activated: bool,

    /// Glob patterns of logical keys that coordinate network-wide resources.
    #[serde(default = "default_network_wide_keys")]
    pub network_wide_keys: Vec<String>,

    // =========================================================================
    // Diagnostics
    // =========================================================================
    /// Where diagnostics are delivered.
    #[serde(default)]
    pub diagnostics: DiagnosticsMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            sync_namespace: default_sync_namespace(),
            try_acquire_delay_ms: default_try_acquire_delay_ms(),
            wait_poll_delay_ms: default_wait_poll_delay_ms(),
            reclaim_every_iterations: default_reclaim_every_iterations(),
            max_execution_time_secs: None,
            default_execution_limit_secs: default_execution_limit_secs(),
            network_activated: false,
            network_wide_keys: default_network_wide_keys(),
            diagnostics: DiagnosticsMode::default(),
        }
    }
}

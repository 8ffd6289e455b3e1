//! Queries answered by the hosting platform.
//!
//! The lock subsystem needs two facts from its host: how long a single
//! request may run (to size the staleness threshold) and whether the
//! installation is activated network-wide (to route shared keys).

use crate::config::Config;

/// Host platform facts consumed by the lock subsystem.
pub trait Platform: Send + Sync {
    /// Maximum single-request execution time in seconds, if the host reports one.
    fn max_execution_time_secs(&self) -> Option<f64>;

    /// Whether the installation is activated across every tenant.
    fn is_network_activated(&self) -> bool;
}

/// Platform facts taken from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPlatform {
    pub max_execution_time_secs: Option<f64>,
    pub network_activated: bool,
}

impl ConfigPlatform {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_execution_time_secs: config.max_execution_time_secs,
            network_activated: config.network_activated,
        }
    }
}

impl Platform for ConfigPlatform {
    fn max_execution_time_secs(&self) -> Option<f64> {
        self.max_execution_time_secs
    }

    fn is_network_activated(&self) -> bool {
        self.network_activated
    }
}

/// Staleness threshold in seconds: twice the execution limit.
///
/// A missing limit, one below a second, or a non-finite value is replaced by
/// `default_limit_secs`.
pub fn staleness_threshold_secs(platform: &dyn Platform, default_limit_secs: u64) -> f64 {
    let limit = platform
        .max_execution_time_secs()
        .filter(|secs| secs.is_finite() && *secs >= 1.0)
        .unwrap_or(default_limit_secs as f64);
    limit * 2.0
}

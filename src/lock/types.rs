//! Lock inspection types.

use crate::codec::OwnerToken;
use crate::storage::{BackendKind, StorageScope};

/// Snapshot of one lock record.
#[derive(Debug, Clone)]
pub struct LockStatus {
    /// The logical key.
    pub key: String,

    /// The physical storage key.
    pub physical_key: String,

    /// Backend the record was read from.
    pub backend: BackendKind,

    /// Scope the record was read from.
    pub scope: StorageScope,

    /// Current holder, if any.
    pub holder: Option<OwnerToken>,

    /// Age of the holder's token in seconds.
    pub age_secs: Option<f64>,

    /// Staleness threshold in effect.
    pub threshold_secs: f64,
}

impl LockStatus {
    /// Whether the lock is held by anyone.
    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    /// Whether the holder's token is past the staleness threshold.
    pub fn is_stale(&self) -> bool {
        self.age_secs.is_some_and(|age| age > self.threshold_secs)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let Some(age) = self.age_secs else {
            return "-".to_string();
        };
        let secs = age.max(0.0) as u64;
        let (hours, minutes, seconds) = (secs / 3600, (secs / 60) % 60, secs % 60);

        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{:.1}s", age.max(0.0))
        }
    }
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.holder {
            None => write!(f, "{} (free, backend: {})", self.key, self.backend),
            Some(token) => write!(
                f,
                "{} (holder: {}, age: {}, backend: {}{})",
                self.key,
                token,
                self.age_string(),
                self.backend,
                if self.is_stale() { ", STALE" } else { "" }
            ),
        }
    }
}

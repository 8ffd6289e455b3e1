//! Diagnostics sink for the lock subsystem.
//!
//! Reclamations, forced backend switches, release mismatches, backend
//! selection, and absorbed storage faults are reported as
//! [`DiagnosticEvent`]s. Delivery is fire-and-forget: a sink that fails to
//! record an event never changes what the lock protocol does.
//!
//! # Event Format
//!
//! The NDJSON sink writes one JSON object per line to
//! `{root}/events/diagnostics.ndjson`:
//! - `ts`: RFC3339 timestamp
//! - `severity`: `info` | `warn` | `error`
//! - `action`: what happened (`reclaim`, `backend_switch`, ...)
//! - `backend`: the backend in use when it happened
//! - `actor`: `user@HOST` of the emitting process
//! - `key`, `token`, `observed`, `elapsed_secs`: present when relevant
//! - `details`: freeform object

use crate::config::DiagnosticsMode;
use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::storage::BackendKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticAction {
    /// A stale lock record was deleted.
    Reclaim,
    /// The active backend was forced to the filesystem.
    BackendSwitch,
    /// The backend was chosen by marker or self-test.
    BackendSelected,
    /// Both backend markers were present and were discarded.
    MarkerConflict,
    /// `release` was called with a token that does not hold the lock.
    ReleaseMismatch,
    /// A storage call failed and was absorbed.
    StorageFault,
}

impl std::fmt::Display for DiagnosticAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticAction::Reclaim => write!(f, "reclaim"),
            DiagnosticAction::BackendSwitch => write!(f, "backend_switch"),
            DiagnosticAction::BackendSelected => write!(f, "backend_selected"),
            DiagnosticAction::MarkerConflict => write!(f, "marker_conflict"),
            DiagnosticAction::ReleaseMismatch => write!(f, "release_mismatch"),
            DiagnosticAction::StorageFault => write!(f, "storage_fault"),
        }
    }
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// One structured diagnostic record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    /// When the event occurred.
    pub ts: DateTime<Utc>,

    pub severity: Severity,

    pub action: DiagnosticAction,

    /// Backend in use when the event occurred.
    pub backend: BackendKind,

    /// `user@HOST` of the emitting process.
    pub actor: String,

    /// Logical lock key, if the event concerns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Token the event is about (stale holder, releasing caller).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Record value observed in storage at the time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<String>,

    /// Age of `token` in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,

    /// Freeform details.
    pub details: Value,
}

impl DiagnosticEvent {
    /// Create a new event stamped with the current time and actor.
    pub fn new(severity: Severity, action: DiagnosticAction, backend: BackendKind) -> Self {
        Self {
            ts: Utc::now(),
            severity,
            action,
            backend,
            actor: get_actor_string(),
            key: None,
            token: None,
            observed: None,
            elapsed_secs: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_observed(mut self, observed: impl Into<String>) -> Self {
        self.observed = Some(observed.into());
        self
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            SyncError::Storage(format!("failed to serialize diagnostic to JSON: {}", e))
        })
    }
}

/// Get the actor string for diagnostics.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Destination for diagnostics. Implementations must not panic or block for long.
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, event: &DiagnosticEvent);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&self, event: &DiagnosticEvent) {
        let key = event.key.as_deref().unwrap_or("");
        let token = event.token.as_deref().unwrap_or("");
        let observed = event.observed.as_deref().unwrap_or("");
        let elapsed = event.elapsed_secs.unwrap_or_default();
        match event.severity {
            Severity::Info => tracing::info!(
                action = %event.action, backend = %event.backend, key, token, observed,
                elapsed_secs = elapsed, details = %event.details, "lock diagnostic"
            ),
            Severity::Warn => tracing::warn!(
                action = %event.action, backend = %event.backend, key, token, observed,
                elapsed_secs = elapsed, details = %event.details, "lock diagnostic"
            ),
            Severity::Error => tracing::error!(
                action = %event.action, backend = %event.backend, key, token, observed,
                elapsed_secs = elapsed, details = %event.details, "lock diagnostic"
            ),
        }
    }
}

/// Appends diagnostics as NDJSON lines to a file.
#[derive(Debug, Clone)]
pub struct NdjsonSink {
    path: PathBuf,
}

impl NdjsonSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, creating the file and its directory if needed.
    pub fn append(&self, event: &DiagnosticEvent) -> Result<()> {
        let json_line = event.to_ndjson_line()?;

        if let Some(dir) = self.path.parent()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| {
                SyncError::Storage(format!(
                    "failed to create events directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                SyncError::Storage(format!(
                    "failed to open diagnostics file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", json_line).map_err(|e| {
            SyncError::Storage(format!(
                "failed to write diagnostic to '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl DiagnosticsSink for NdjsonSink {
    fn emit(&self, event: &DiagnosticEvent) {
        if let Err(e) = self.append(event) {
            tracing::debug!(error = %e, "dropped diagnostic");
        }
    }
}

/// Delivers every event to each inner sink.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DiagnosticsSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn DiagnosticsSink>>) -> Self {
        Self { sinks }
    }
}

impl DiagnosticsSink for FanoutSink {
    fn emit(&self, event: &DiagnosticEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// Keeps events in memory; used to observe the lock protocol.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Recorded events with the given action.
    pub fn with_action(&self, action: DiagnosticAction) -> Vec<DiagnosticEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }
}

impl DiagnosticsSink for MemorySink {
    fn emit(&self, event: &DiagnosticEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(event.clone());
    }
}

/// Build the sink selected by `mode` for a state root.
pub fn sink_for(mode: DiagnosticsMode, ctx: &SyncContext) -> Arc<dyn DiagnosticsSink> {
    match mode {
        DiagnosticsMode::Tracing => Arc::new(TracingSink),
        DiagnosticsMode::Ndjson => Arc::new(NdjsonSink::new(ctx.diagnostics_path())),
        DiagnosticsMode::Both => Arc::new(FanoutSink::new(vec![
            Arc::new(TracingSink),
            Arc::new(NdjsonSink::new(ctx.diagnostics_path())),
        ])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_event_creation() {
        let event = DiagnosticEvent::new(Severity::Warn, DiagnosticAction::Reclaim, BackendKind::Kv);

        assert_eq!(event.action, DiagnosticAction::Reclaim);
        assert!(!event.actor.is_empty());
        assert!(event.key.is_none());
        let age = Utc::now().signed_duration_since(event.ts);
        assert!(age.num_minutes() < 1);
    }

    #[test]
    fn test_event_serialization_omits_empty_fields() {
        let event =
            DiagnosticEvent::new(Severity::Info, DiagnosticAction::BackendSelected, BackendKind::File);
        let line = event.to_ndjson_line().unwrap();

        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert!(parsed.get("key").is_none());
        assert!(parsed.get("token").is_none());
        assert_eq!(parsed["action"], "backend_selected");
        assert_eq!(parsed["backend"], "file");
        assert_eq!(parsed["severity"], "info");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_event_full_fields() {
        let event = DiagnosticEvent::new(Severity::Error, DiagnosticAction::BackendSwitch, BackendKind::Kv)
            .with_key("rebuild")
            .with_token("1.000000_rebuild_ab")
            .with_observed("1.000000_rebuild_ab")
            .with_elapsed(130.5)
            .with_details(json!({"reason": "delete ignored"}));

        let parsed: DiagnosticEvent = serde_json::from_str(&event.to_ndjson_line().unwrap()).unwrap();
        assert_eq!(parsed.key.as_deref(), Some("rebuild"));
        assert_eq!(parsed.token.as_deref(), Some("1.000000_rebuild_ab"));
        assert_eq!(parsed.elapsed_secs, Some(130.5));
        assert_eq!(parsed.details["reason"], "delete ignored");
    }

    #[test]
    fn test_ndjson_sink_appends_lines() {
        let temp_dir = TempDir::new().unwrap();
        let sink = NdjsonSink::new(temp_dir.path().join("events").join("diagnostics.ndjson"));

        sink.emit(&DiagnosticEvent::new(Severity::Warn, DiagnosticAction::Reclaim, BackendKind::Kv));
        sink.emit(&DiagnosticEvent::new(
            Severity::Warn,
            DiagnosticAction::ReleaseMismatch,
            BackendKind::File,
        ));

        let content = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(content.ends_with('\n'));

        let second: DiagnosticEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.action, DiagnosticAction::ReleaseMismatch);
    }

    #[test]
    fn test_ndjson_sink_failure_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the file should be makes open() fail.
        let path = temp_dir.path().join("occupied");
        fs::create_dir_all(&path).unwrap();

        let sink = NdjsonSink::new(&path);
        sink.emit(&DiagnosticEvent::new(Severity::Info, DiagnosticAction::Reclaim, BackendKind::Kv));
        assert!(sink.append(&DiagnosticEvent::new(Severity::Info, DiagnosticAction::Reclaim, BackendKind::Kv)).is_err());
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = MemorySink::new();
        let b = MemorySink::new();
        let fanout = FanoutSink::new(vec![Arc::new(a.clone()), Arc::new(b.clone())]);

        fanout.emit(&DiagnosticEvent::new(Severity::Info, DiagnosticAction::Reclaim, BackendKind::Kv));

        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }

    #[test]
    fn test_sink_for_ndjson_writes_under_root() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = SyncContext::at(temp_dir.path());
        let sink = sink_for(DiagnosticsMode::Ndjson, &ctx);

        sink.emit(&DiagnosticEvent::new(Severity::Info, DiagnosticAction::Reclaim, BackendKind::Kv));

        assert!(ctx.diagnostics_path().exists());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(DiagnosticAction::Reclaim.to_string(), "reclaim");
        assert_eq!(DiagnosticAction::BackendSwitch.to_string(), "backend_switch");
        assert_eq!(DiagnosticAction::ReleaseMismatch.to_string(), "release_mismatch");
        assert_eq!(DiagnosticAction::StorageFault.to_string(), "storage_fault");
    }

    #[test]
    fn test_get_actor_string() {
        assert!(get_actor_string().contains('@'));
    }
}

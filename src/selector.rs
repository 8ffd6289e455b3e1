//! Choice of the authoritative storage backend.
//!
//! The first process to need a lock runs a self-test against the KV store
//! and records the outcome as a marker file under `{root}/markers/`:
//! - `backend-kv`: the KV store honors writes and deletes
//! - `backend-file`: the KV store is unreliable; use the shared filesystem
//!
//! Later processes read the marker and skip the self-test. Finding both
//! markers is ambiguous; both are removed and the self-test runs again.
//! `force_switch_to_file_backend` demotes a running deployment to the
//! filesystem, and only `reset` (a manual marker clear) undoes that.

use crate::codec::OwnerToken;
use crate::diagnostics::{DiagnosticAction, DiagnosticEvent, DiagnosticsSink, Severity};
use crate::error::{Result, SyncError};
use crate::fs::atomic_write_file;
use crate::storage::{BackendKind, StorageBackend, StorageScope};
use serde_json::json;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Marker filename recording that the KV store is authoritative.
pub const KV_MARKER: &str = "backend-kv";

/// Marker filename recording that the filesystem is authoritative.
pub const FILE_MARKER: &str = "backend-file";

/// Logical name of the record written by the self-test.
pub const PROBE_KEY: &str = "backend_probe";

/// Selects, persists, and caches the active backend.
pub struct BackendSelector {
    kv: Arc<dyn StorageBackend>,
    file: Arc<dyn StorageBackend>,
    markers_dir: PathBuf,
    probe_key: String,
    decision: Mutex<Option<BackendKind>>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl BackendSelector {
    /// Create a selector. Nothing is probed until the first call to [`active`](Self::active).
    pub fn new(
        kv: Arc<dyn StorageBackend>,
        file: Arc<dyn StorageBackend>,
        markers_dir: impl AsRef<Path>,
        probe_key: impl Into<String>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            kv,
            file,
            markers_dir: markers_dir.as_ref().to_path_buf(),
            probe_key: probe_key.into(),
            decision: Mutex::new(None),
            sink,
        }
    }

    /// The backend in use, deciding it on first call.
    pub fn active(&self) -> BackendKind {
        let mut decision = self.decision();
        if let Some(kind) = *decision {
            return kind;
        }
        let kind = self.determine();
        *decision = Some(kind);
        kind
    }

    /// Storage for the active backend.
    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        self.storage_for(self.active())
    }

    /// Storage for a specific backend.
    pub fn storage_for(&self, kind: BackendKind) -> Arc<dyn StorageBackend> {
        match kind {
            BackendKind::Kv => Arc::clone(&self.kv),
            BackendKind::File => Arc::clone(&self.file),
        }
    }

    /// Whether the filesystem backend is in use.
    pub fn is_file_backend(&self) -> bool {
        self.active() == BackendKind::File
    }

    /// Permanently switch this deployment to the filesystem backend.
    ///
    /// Overwrites the cached decision, writes the file marker, and removes
    /// the KV marker.
    pub fn force_switch_to_file_backend(&self) {
        let mut decision = self.decision();
        let previous = *decision;
        *decision = Some(BackendKind::File);
        drop(decision);

        self.persist_marker(BackendKind::File);
        if let Err(e) = self.remove_marker(KV_MARKER) {
            self.report_fault(&e, BackendKind::File);
        }

        self.sink.emit(
            &DiagnosticEvent::new(Severity::Error, DiagnosticAction::BackendSwitch, BackendKind::File)
                .with_details(json!({
                    "previous": previous.map(|k| k.as_str()),
                })),
        );
    }

    /// Forget the decision and delete both markers so the next use re-runs the self-test.
    pub fn reset(&self) -> Result<()> {
        *self.decision() = None;
        self.remove_marker(KV_MARKER)?;
        self.remove_marker(FILE_MARKER)
    }

    /// Which markers currently exist on disk, as `(kv, file)`.
    pub fn markers_present(&self) -> (bool, bool) {
        (
            self.markers_dir.join(KV_MARKER).exists(),
            self.markers_dir.join(FILE_MARKER).exists(),
        )
    }

    fn decision(&self) -> MutexGuard<'_, Option<BackendKind>> {
        self.decision
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn determine(&self) -> BackendKind {
        match self.markers_present() {
            (true, true) => {
                self.sink.emit(&DiagnosticEvent::new(
                    Severity::Warn,
                    DiagnosticAction::MarkerConflict,
                    BackendKind::Kv,
                ));
                for marker in [KV_MARKER, FILE_MARKER] {
                    if let Err(e) = self.remove_marker(marker) {
                        self.report_fault(&e, BackendKind::Kv);
                    }
                }
            }
            (true, false) => return BackendKind::Kv,
            (false, true) => return BackendKind::File,
            (false, false) => {}
        }

        let kind = if self.kv_self_test() {
            BackendKind::Kv
        } else {
            BackendKind::File
        };
        self.persist_marker(kind);
        self.sink.emit(
            &DiagnosticEvent::new(Severity::Info, DiagnosticAction::BackendSelected, kind)
                .with_details(json!({ "source": "self_test" })),
        );
        kind
    }

    /// Write, read back, delete, and re-read a probe value through the KV store.
    fn kv_self_test(&self) -> bool {
        let probe = OwnerToken::with_timestamp(crate::codec::now_secs(), PROBE_KEY);
        let scope = StorageScope::Local;
        // A per-run key keeps concurrent self-tests in other processes from
        // reading each other's probe.
        let nonce = probe.as_str().rsplit('_').next().unwrap_or_default();
        let key = format!("{}_{}", self.probe_key, nonce);
        let key = key.as_str();

        let passed = self.kv.write(key, probe.as_str(), scope).is_ok()
            && self.kv.read(key, scope).is_ok_and(|v| v == probe.as_str())
            && self.kv.delete(key, scope).is_ok()
            && self.kv.read(key, scope).is_ok_and(|v| v.is_empty());

        if !passed {
            tracing::debug!(key, "kv self-test failed");
            let _ = self.kv.delete(key, scope);
        }
        passed
    }

    fn persist_marker(&self, kind: BackendKind) {
        let name = match kind {
            BackendKind::Kv => KV_MARKER,
            BackendKind::File => FILE_MARKER,
        };
        let stamp = chrono::Utc::now().to_rfc3339();
        if let Err(e) = atomic_write_file(self.markers_dir.join(name), &stamp) {
            self.report_fault(&e, kind);
        }
    }

    fn remove_marker(&self, name: &str) -> Result<()> {
        let path = self.markers_dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Storage(format!(
                "failed to remove marker '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    // Must not touch `decision`: callers may already hold it.
    fn report_fault(&self, err: &SyncError, backend: BackendKind) {
        self.sink.emit(
            &DiagnosticEvent::new(Severity::Warn, DiagnosticAction::StorageFault, backend)
                .with_details(json!({ "error": err.to_string() })),
        );
    }
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelector")
            .field("markers_dir", &self.markers_dir)
            .field("decision", &*self.decision())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::storage::{FileStore, KvStore, MemoryTable};
    use crate::test_support::FlakyTable;
    use tempfile::TempDir;

    fn selector_with(kv: KvStore, root: &Path, sink: &MemorySink) -> BackendSelector {
        BackendSelector::new(
            Arc::new(kv),
            Arc::new(FileStore::new(root.join("files"))),
            root.join("markers"),
            "synclock_sync_backend_probe",
            Arc::new(sink.clone()),
        )
    }

    fn healthy_kv() -> KvStore {
        KvStore::new(Arc::new(MemoryTable::new()), Arc::new(MemoryTable::new()))
    }

    #[test]
    fn test_healthy_kv_selects_kv_and_persists_marker() {
        let temp_dir = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let selector = selector_with(healthy_kv(), temp_dir.path(), &sink);

        assert_eq!(selector.active(), BackendKind::Kv);
        assert_eq!(selector.markers_present(), (true, false));
        assert_eq!(sink.with_action(DiagnosticAction::BackendSelected).len(), 1);
    }

    #[test]
    fn test_probe_record_is_cleaned_up() {
        let temp_dir = TempDir::new().unwrap();
        let local = MemoryTable::new();
        let kv = KvStore::new(Arc::new(local.clone()), Arc::new(MemoryTable::new()));
        let selector = selector_with(kv, temp_dir.path(), &MemorySink::new());

        selector.active();

        assert!(local.is_empty());
    }

    #[test]
    fn test_mismatched_read_back_selects_file() {
        let temp_dir = TempDir::new().unwrap();
        let kv = KvStore::new(Arc::new(FlakyTable::scrambled()), Arc::new(MemoryTable::new()));
        let selector = selector_with(kv, temp_dir.path(), &MemorySink::new());

        assert_eq!(selector.active(), BackendKind::File);
        assert_eq!(selector.markers_present(), (false, true));
    }

    #[test]
    fn test_ignored_delete_selects_file() {
        let temp_dir = TempDir::new().unwrap();
        let kv = KvStore::new(Arc::new(FlakyTable::deaf()), Arc::new(MemoryTable::new()));
        let selector = selector_with(kv, temp_dir.path(), &MemorySink::new());

        assert!(selector.is_file_backend());
    }

    #[test]
    fn test_second_process_adopts_marker_without_self_test() {
        let temp_dir = TempDir::new().unwrap();
        let first = selector_with(
            KvStore::new(Arc::new(FlakyTable::scrambled()), Arc::new(MemoryTable::new())),
            temp_dir.path(),
            &MemorySink::new(),
        );
        assert_eq!(first.active(), BackendKind::File);

        // A healthy KV would pass the self-test, so selecting File proves the marker was used.
        let sink = MemorySink::new();
        let second = selector_with(healthy_kv(), temp_dir.path(), &sink);
        assert_eq!(second.active(), BackendKind::File);
        assert!(sink.with_action(DiagnosticAction::BackendSelected).is_empty());
    }

    #[test]
    fn test_both_markers_discarded_and_retested() {
        let temp_dir = TempDir::new().unwrap();
        let markers = temp_dir.path().join("markers");
        fs::create_dir_all(&markers).unwrap();
        fs::write(markers.join(KV_MARKER), "x").unwrap();
        fs::write(markers.join(FILE_MARKER), "x").unwrap();

        let sink = MemorySink::new();
        let selector = selector_with(healthy_kv(), temp_dir.path(), &sink);

        assert_eq!(selector.active(), BackendKind::Kv);
        assert_eq!(selector.markers_present(), (true, false));
        assert_eq!(sink.with_action(DiagnosticAction::MarkerConflict).len(), 1);
    }

    #[test]
    fn test_decision_is_cached() {
        let temp_dir = TempDir::new().unwrap();
        let selector = selector_with(healthy_kv(), temp_dir.path(), &MemorySink::new());
        assert_eq!(selector.active(), BackendKind::Kv);

        // Removing markers behind the selector's back does not trigger a new probe.
        fs::remove_dir_all(temp_dir.path().join("markers")).unwrap();
        assert_eq!(selector.active(), BackendKind::Kv);
        assert_eq!(selector.markers_present(), (false, false));
    }

    #[test]
    fn test_force_switch_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let selector = selector_with(healthy_kv(), temp_dir.path(), &sink);
        assert_eq!(selector.active(), BackendKind::Kv);

        selector.force_switch_to_file_backend();

        assert_eq!(selector.active(), BackendKind::File);
        assert_eq!(selector.backend().kind(), BackendKind::File);
        assert_eq!(selector.markers_present(), (false, true));
        assert_eq!(sink.with_action(DiagnosticAction::BackendSwitch).len(), 1);
    }

    #[test]
    fn test_reset_clears_markers_and_decision() {
        let temp_dir = TempDir::new().unwrap();
        let selector = selector_with(healthy_kv(), temp_dir.path(), &MemorySink::new());
        selector.force_switch_to_file_backend();

        selector.reset().unwrap();
        assert_eq!(selector.markers_present(), (false, false));

        assert_eq!(selector.active(), BackendKind::Kv);
    }
}

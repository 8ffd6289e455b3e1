//! The lock protocol.

use super::guard::LockGuard;
use super::types::LockStatus;
use crate::codec::{KeyCodec, OwnerToken, now_secs};
use crate::config::Config;
use crate::context::SyncContext;
use crate::diagnostics::{self, DiagnosticAction, DiagnosticEvent, DiagnosticsSink, Severity};
use crate::error::{Result, SyncError};
use crate::platform::{ConfigPlatform, Platform, staleness_threshold_secs};
use crate::scope::ScopeRouter;
use crate::selector::{BackendSelector, PROBE_KEY};
use crate::storage::{BackendKind, FileStore, KvStore, StorageBackend, StorageScope};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Protocol delays and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTiming {
    /// Sleep between write and verify in `try_acquire`.
    pub try_acquire_delay: Duration,
    /// Sleep between rounds of `acquire_with_wait`.
    pub wait_poll_delay: Duration,
    /// Rounds of `acquire_with_wait` between extra staleness checks.
    pub reclaim_every: u32,
    /// Execution limit assumed when the platform reports none.
    pub default_execution_limit_secs: u64,
}

impl LockTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            try_acquire_delay: config.try_acquire_delay(),
            wait_poll_delay: config.wait_poll_delay(),
            reclaim_every: config.reclaim_every_iterations.max(1),
            default_execution_limit_secs: config.default_execution_limit_secs,
        }
    }
}

impl Default for LockTiming {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Named mutex shared by independent processes through weak storage.
///
/// Construct one per process and share it by reference; it holds the
/// cached backend decision for that process.
pub struct LockService {
    codec: KeyCodec,
    router: ScopeRouter,
    selector: BackendSelector,
    platform: Arc<dyn Platform>,
    sink: Arc<dyn DiagnosticsSink>,
    timing: LockTiming,
}

impl LockService {
    /// Open the lock service for a state root.
    ///
    /// Uses the JSON options tables under `kv/`, the FileStore under
    /// `files/`, markers under `markers/`, and the diagnostics sink named
    /// by `config.diagnostics`.
    pub fn open(ctx: &SyncContext, config: &Config) -> Result<Self> {
        config.validate()?;
        Self::from_parts(
            config,
            Arc::new(KvStore::for_context(ctx)),
            Arc::new(FileStore::new(&ctx.files_dir)),
            &ctx.markers_dir,
            Arc::new(ConfigPlatform::from_config(config)),
            diagnostics::sink_for(config.diagnostics, ctx),
        )
    }

    /// Assemble a lock service from explicit collaborators.
    pub fn from_parts(
        config: &Config,
        kv: Arc<dyn StorageBackend>,
        file: Arc<dyn StorageBackend>,
        markers_dir: impl AsRef<Path>,
        platform: Arc<dyn Platform>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self> {
        let codec = KeyCodec::from_config(config);
        let router = ScopeRouter::from_config(config, platform.as_ref())?;
        let selector = BackendSelector::new(
            kv,
            file,
            markers_dir,
            codec.physical_key(PROBE_KEY),
            Arc::clone(&sink),
        );

        Ok(Self {
            codec,
            router,
            selector,
            platform,
            sink,
            timing: LockTiming::from_config(config),
        })
    }

    /// The backend selector this service consults.
    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    /// The key codec this service uses.
    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// Age in seconds beyond which a held lock is presumed abandoned.
    pub fn staleness_threshold(&self) -> f64 {
        staleness_threshold_secs(
            self.platform.as_ref(),
            self.timing.default_execution_limit_secs,
        )
    }

    /// Try once to take the lock.
    ///
    /// Returns the owner token on success and `None` when another process
    /// holds the lock or won the race. `None` is also possible without any
    /// contention and is never an error.
    pub fn try_acquire(&self, key: &str) -> Option<OwnerToken> {
        let token = self.codec.new_owner_token(key);
        self.reclaim_if_stale(key);

        let record = self.record(key);
        if record.read().is_empty() {
            record.write(token.as_str());
        }

        thread::sleep(self.timing.try_acquire_delay);

        if self.record(key).read() == token.as_str() {
            tracing::debug!(key, token = %token, "lock acquired");
            Some(token)
        } else {
            tracing::debug!(key, "lock not acquired");
            None
        }
    }

    /// Block until the lock is taken. There is no timeout.
    ///
    /// One token is used for the whole wait; each round writes it if the
    /// record is empty and then checks whether it survived. A stale holder
    /// is reclaimed before the first round and again every
    /// `reclaim_every` rounds.
    pub fn acquire_with_wait(&self, key: &str) -> OwnerToken {
        let token = self.codec.new_owner_token(key);
        self.reclaim_if_stale(key);

        let mut rounds: u64 = 0;
        loop {
            let record = self.record(key);
            if record.read().is_empty() {
                record.write(token.as_str());
            }

            thread::sleep(self.timing.wait_poll_delay);

            if self.record(key).read() == token.as_str() {
                tracing::debug!(key, token = %token, rounds, "lock acquired after wait");
                return token;
            }

            rounds += 1;
            if rounds % u64::from(self.timing.reclaim_every) == 0 {
                self.reclaim_if_stale(key);
            }
        }
    }

    /// Release the lock if `token` still holds it.
    ///
    /// A mismatch (the lock was reclaimed as stale, or is held by someone
    /// else) leaves the record untouched and is reported as a diagnostic.
    /// Returns whether the record was deleted.
    pub fn release(&self, token: &OwnerToken, key: &str) -> bool {
        let record = self.record(key);
        let current = record.read();

        if current == token.as_str() {
            record.delete();
            tracing::debug!(key, token = %token, "lock released");
            return true;
        }

        self.sink.emit(
            &DiagnosticEvent::new(
                Severity::Warn,
                DiagnosticAction::ReleaseMismatch,
                record.backend.kind(),
            )
            .with_key(key)
            .with_token(token.as_str())
            .with_observed(current)
            .with_elapsed(token.age_secs(now_secs())),
        );
        false
    }

    /// Delete the record if its token is older than the staleness threshold.
    ///
    /// If the stale token is still there after the delete and the KV store
    /// is in use, the deployment is switched to the filesystem backend for
    /// good. Returns whether a stale record was found.
    pub fn reclaim_if_stale(&self, key: &str) -> bool {
        let record = self.record(key);
        let current = record.read();
        if current.is_empty() {
            return false;
        }

        let holder = OwnerToken::from_raw(current);
        let elapsed = holder.age_secs(now_secs());
        let threshold = self.staleness_threshold();
        if elapsed <= threshold {
            return false;
        }

        record.delete();
        let after = record.read();
        let backend = record.backend.kind();

        let event = DiagnosticEvent::new(Severity::Warn, DiagnosticAction::Reclaim, backend)
            .with_key(key)
            .with_token(holder.as_str())
            .with_elapsed(elapsed)
            .with_details(json!({ "threshold_secs": threshold }));

        // Anything other than the stale token itself means the delete took
        // effect and a racing process re-acquired in between.
        if backend == BackendKind::File || after != holder.as_str() {
            self.sink.emit(&event.with_observed(after));
            return true;
        }

        let mut event = event.with_observed(after);
        event.severity = Severity::Error;
        event.details = json!({
            "threshold_secs": threshold,
            "delete_ignored": true,
        });
        self.sink.emit(&event);
        self.selector.force_switch_to_file_backend();
        true
    }

    /// Inspect the lock record for `key` without changing it.
    pub fn lock_status(&self, key: &str) -> LockStatus {
        let record = self.record(key);
        let current = record.read();
        let holder = (!current.is_empty()).then(|| OwnerToken::from_raw(current));
        let age_secs = holder.as_ref().map(|t| t.age_secs(now_secs()));

        LockStatus {
            key: key.to_string(),
            physical_key: record.physical,
            backend: record.backend.kind(),
            scope: record.scope,
            holder,
            age_secs,
            threshold_secs: self.staleness_threshold(),
        }
    }

    /// `try_acquire`, wrapping the token in a guard that releases on drop.
    pub fn try_acquire_guard(&self, key: &str) -> Option<LockGuard<'_>> {
        self.try_acquire(key)
            .map(|token| LockGuard::new(self, key, token))
    }

    /// `acquire_with_wait`, wrapping the token in a guard that releases on drop.
    pub fn acquire_guard(&self, key: &str) -> LockGuard<'_> {
        let token = self.acquire_with_wait(key);
        LockGuard::new(self, key, token)
    }

    /// `try_acquire`, turning a lost race into an error for CLI use.
    pub fn try_acquire_or_err(&self, key: &str) -> Result<OwnerToken> {
        self.try_acquire(key).ok_or_else(|| {
            let status = self.lock_status(key);
            SyncError::Lock(format!("lock is held by another process\nLock: {}", status))
        })
    }

    /// Resolve the record for `key` against the backend active right now.
    fn record(&self, key: &str) -> Record<'_> {
        Record {
            service: self,
            key: key.to_string(),
            physical: self.codec.physical_key(key),
            scope: self.router.scope_for(key),
            backend: self.selector.backend(),
        }
    }

    fn report_fault(&self, key: &str, op: &str, backend: &dyn StorageBackend, err: &SyncError) {
        self.sink.emit(
            &DiagnosticEvent::new(Severity::Warn, DiagnosticAction::StorageFault, backend.kind())
                .with_key(key)
                .with_details(json!({ "op": op, "error": err.to_string() })),
        );
    }
}

impl std::fmt::Debug for LockService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockService")
            .field("codec", &self.codec)
            .field("selector", &self.selector)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

/// One lock record on one backend. Storage faults are absorbed here:
/// a failed read is an empty record, a failed write or delete is a no-op.
struct Record<'a> {
    service: &'a LockService,
    key: String,
    physical: String,
    scope: StorageScope,
    backend: Arc<dyn StorageBackend>,
}

impl Record<'_> {
    fn read(&self) -> String {
        self.backend
            .read(&self.physical, self.scope)
            .unwrap_or_else(|e| {
                self.service
                    .report_fault(&self.key, "read", self.backend.as_ref(), &e);
                String::new()
            })
    }

    fn write(&self, value: &str) {
        if let Err(e) = self.backend.write(&self.physical, value, self.scope) {
            self.service
                .report_fault(&self.key, "write", self.backend.as_ref(), &e);
        }
    }

    fn delete(&self) {
        if let Err(e) = self.backend.delete(&self.physical, self.scope) {
            self.service
                .report_fault(&self.key, "delete", self.backend.as_ref(), &e);
        }
    }
}

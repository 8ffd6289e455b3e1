use crate::config::Config;
use crate::diagnostics::MemorySink;
use crate::error::Result;
use crate::lock::LockService;
use crate::platform::ConfigPlatform;
use crate::storage::{FileStore, KvStore, MemoryTable, OptionsTable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Options table whose misbehavior can be switched on at runtime.
///
/// `ignore_deletes` models a cached or lagging store that acknowledges a
/// delete without applying it; `scramble_reads` models one that returns a
/// different value than was written. `race_next_delete` models another
/// process writing right after a delete has been applied.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlakyTable {
    inner: MemoryTable,
    ignore_deletes: Arc<AtomicBool>,
    scramble_reads: Arc<AtomicBool>,
    racer: Arc<Mutex<Option<String>>>,
}

impl FlakyTable {
    pub(crate) fn healthy() -> Self {
        Self::default()
    }

    pub(crate) fn deaf() -> Self {
        let table = Self::default();
        table.set_ignore_deletes(true);
        table
    }

    pub(crate) fn scrambled() -> Self {
        let table = Self::default();
        table.scramble_reads.store(true, Ordering::SeqCst);
        table
    }

    pub(crate) fn set_ignore_deletes(&self, on: bool) {
        self.ignore_deletes.store(on, Ordering::SeqCst);
    }

    /// After the next applied delete, store `value` at the deleted key.
    pub(crate) fn race_next_delete(&self, value: &str) {
        *self.racer.lock().unwrap() = Some(value.to_string());
    }
}

impl OptionsTable for FlakyTable {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.inner.get(key)?;
        if self.scramble_reads.load(Ordering::SeqCst) {
            return Ok(value.map(|v| format!("{}-stale-replica", v)));
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        if self.ignore_deletes.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.delete(key)?;
        if let Some(value) = self.racer.lock().unwrap().take() {
            self.inner.set(key, &value)?;
        }
        Ok(())
    }
}

/// Shared storage standing in for one deployment that many processes use.
///
/// Each call to [`process`](Self::process) builds an independent
/// `LockService`, as a separate request-handling process would, over the
/// same KV tables and the same marker/file directories.
pub(crate) struct TestDeployment {
    pub(crate) dir: TempDir,
    pub(crate) local: Arc<dyn OptionsTable>,
    pub(crate) network: MemoryTable,
    pub(crate) config: Config,
}

impl TestDeployment {
    pub(crate) fn new() -> Self {
        Self::with_local_table(Arc::new(MemoryTable::new()))
    }

    pub(crate) fn with_local_table(local: Arc<dyn OptionsTable>) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            local,
            network: MemoryTable::new(),
            config: fast_config(),
        }
    }

    pub(crate) fn files_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("files")
    }

    pub(crate) fn markers_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("markers")
    }

    pub(crate) fn kv(&self) -> KvStore {
        KvStore::new(Arc::clone(&self.local), Arc::new(self.network.clone()))
    }

    pub(crate) fn process(&self) -> (LockService, MemorySink) {
        let platform = ConfigPlatform::from_config(&self.config);
        self.process_on(platform)
    }

    pub(crate) fn process_on(&self, platform: ConfigPlatform) -> (LockService, MemorySink) {
        let sink = MemorySink::new();
        let service = LockService::from_parts(
            &self.config,
            Arc::new(self.kv()),
            Arc::new(FileStore::new(self.files_dir())),
            self.markers_dir(),
            Arc::new(platform),
            Arc::new(sink.clone()),
        )
        .unwrap();
        (service, sink)
    }
}

/// Default config with millisecond-scale protocol delays.
pub(crate) fn fast_config() -> Config {
    Config {
        try_acquire_delay_ms: 5,
        wait_poll_delay_ms: 10,
        reclaim_every_iterations: 3,
        ..Config::default()
    }
}

//! Key/value backend over a local and a network-wide options table.

use super::table::{JsonOptionsTable, OptionsTable};
use super::{BackendKind, StorageBackend, StorageScope};
use crate::context::SyncContext;
use crate::error::Result;
use std::sync::Arc;

/// Lock records kept in shared options tables.
#[derive(Clone)]
pub struct KvStore {
    local: Arc<dyn OptionsTable>,
    network: Arc<dyn OptionsTable>,
}

impl KvStore {
    /// Create a store over explicit tables.
    pub fn new(local: Arc<dyn OptionsTable>, network: Arc<dyn OptionsTable>) -> Self {
        Self { local, network }
    }

    /// Create a store over the JSON tables under the state root.
    pub fn for_context(ctx: &SyncContext) -> Self {
        Self::new(
            Arc::new(JsonOptionsTable::new(ctx.kv_dir.join("options.json"))),
            Arc::new(JsonOptionsTable::new(ctx.kv_dir.join("network-options.json"))),
        )
    }

    fn table(&self, scope: StorageScope) -> &dyn OptionsTable {
        match scope {
            StorageScope::Local => self.local.as_ref(),
            StorageScope::Network => self.network.as_ref(),
        }
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore").finish_non_exhaustive()
    }
}

impl StorageBackend for KvStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Kv
    }

    fn read(&self, key: &str, scope: StorageScope) -> Result<String> {
        Ok(self.table(scope).get(key)?.unwrap_or_default())
    }

    fn write(&self, key: &str, value: &str, scope: StorageScope) -> Result<()> {
        self.table(scope).set(key, value)
    }

    fn delete(&self, key: &str, scope: StorageScope) -> Result<()> {
        self.table(scope).delete(key)
    }
}

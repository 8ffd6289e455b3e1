//! Raw string storage for lock records.
//!
//! Two interchangeable backends implement [`StorageBackend`]:
//! - [`KvStore`]: a shared options table (local and network-wide scopes)
//! - [`FileStore`]: one file per key on a shared filesystem
//!
//! The contract is deliberately weak: `read` returns an empty string for an
//! absent key, `write` is unconditional, and there is no compare-and-swap.

mod file;
mod kv;
mod table;


pub use file::FileStore;
pub use kv::KvStore;
pub use table::{JsonOptionsTable, MemoryTable, OptionsTable};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which storage medium holds lock records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Shared key/value options table.
    Kv,
    /// Shared filesystem, one file per key.
    File,
}

impl BackendKind {
    /// Short name used in markers and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Kv => "kv",
            BackendKind::File => "file",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility of a KV record in a multi-tenant installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageScope {
    /// Visible to the current tenant only.
    #[default]
    Local,
    /// Visible to every tenant of the installation.
    Network,
}

/// Get/set/delete of a string value per key.
///
/// Implementations are shared between threads of one process and between
/// unrelated processes through the underlying medium.
pub trait StorageBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Read the value at `key`; an absent key reads as an empty string.
    fn read(&self, key: &str, scope: StorageScope) -> Result<String>;

    /// Unconditionally store `value` at `key`.
    fn write(&self, key: &str, value: &str, scope: StorageScope) -> Result<()>;

    /// Remove `key`. Deleting an absent key is not an error.
    fn delete(&self, key: &str, scope: StorageScope) -> Result<()>;
}

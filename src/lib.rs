//! synclock: a best-effort named mutex for processes that share nothing but
//! weak storage.
//!
//! Processes that cannot share memory, and may run on different machines,
//! coordinate through either a slow key/value options table without
//! compare-and-swap or a shared filesystem. [`lock::LockService`] implements
//! the write-then-verify protocol, reclaims locks abandoned by crashed
//! holders, and demotes itself to the filesystem when the key/value store
//! stops honoring deletes.
//!
//! ```no_run
//! use synclock::config::Config;
//! use synclock::context::SyncContext;
//! use synclock::lock::LockService;
//!
//! let ctx = SyncContext::resolve(None)?;
//! let config = Config::load_or_default(ctx.config_path())?;
//! let locks = LockService::open(&ctx, &config)?;
//!
//! if let Some(guard) = locks.try_acquire_guard("rebuild") {
//!     // ... exclusive work ...
//!     guard.release();
//! }
//! # Ok::<(), synclock::error::SyncError>(())
//! ```

pub mod codec;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod lock;
pub mod platform;
pub mod scope;
pub mod selector;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use codec::{KeyCodec, OwnerToken};
pub use error::{Result, SyncError};
pub use lock::{LockGuard, LockService, LockStatus};
pub use storage::{BackendKind, StorageBackend, StorageScope};

//! Named mutex over weak shared storage.
//!
//! A lock record is a single string at a physical key: empty when the lock
//! is free, or the owner token of the holder. There is no compare-and-swap,
//! so acquisition is write-then-wait-then-verify:
//!
//! 1. reclaim the record if its token is older than the staleness threshold
//! 2. read the record; if empty, write our token
//! 3. sleep a fixed delay so a concurrent writer can overwrite us
//! 4. re-read; we hold the lock iff the record is still our token
//!
//! The scheme is best-effort, not linearizable. `try_acquire` can fail
//! without contention and callers must tolerate that.
//!
//! # Staleness
//!
//! A token's age is read from its leading timestamp. A record older than
//! twice the platform's execution limit (120 s when the limit is unknown) is
//! presumed abandoned and deleted by the next acquisition attempt on that
//! key. If the delete does not take effect on the KV store, the whole
//! deployment is switched to the filesystem backend.

mod guard;
mod service;
mod types;


// Re-export public API
pub use guard::LockGuard;
pub use service::{LockService, LockTiming};
pub use types::LockStatus;

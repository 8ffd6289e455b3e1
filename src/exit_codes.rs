//! Exit code constants for the synclock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 3: Storage failure
//! - 4: Lock not acquired

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Storage failure: a backend read, write, or delete could not complete.
pub const STORAGE_FAILURE: i32 = 3;

/// Lock acquisition failure: `try_acquire` lost the race or the key is held.
pub const LOCK_FAILURE: i32 = 4;

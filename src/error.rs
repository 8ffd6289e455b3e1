//! Error types for synclock.
//!
//! Uses thiserror for derive macros. The lock protocol itself never returns
//! these to callers; they surface from configuration loading, the storage
//! backends, and the CLI.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for synclock operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration could not be read, parsed, or validated.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A storage backend operation failed.
    #[error("Storage operation failed: {0}")]
    Storage(String),

    /// Lock could not be acquired.
    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    /// User provided invalid arguments.
    #[error("{0}")]
    User(String),
}

impl SyncError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Config(_) => exit_codes::USER_ERROR,
            SyncError::User(_) => exit_codes::USER_ERROR,
            SyncError::Storage(_) => exit_codes::STORAGE_FAILURE,
            SyncError::Lock(_) => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Result type alias for synclock operations.
pub type Result<T> = std::result::Result<T, SyncError>;

//! Filesystem utilities for synclock.
//!
//! Every file the crate persists (lock records, backend markers, KV tables,
//! config) is replaced atomically through this module.

pub mod atomic;

pub use atomic::{atomic_write, atomic_write_file};

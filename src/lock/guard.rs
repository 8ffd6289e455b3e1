//! RAII lock guard.

use super::service::LockService;
use crate::codec::OwnerToken;

/// Holds an acquired lock and releases it when dropped.
///
/// Releasing a lock that was meanwhile reclaimed as stale is reported as a
/// diagnostic by the service and never panics.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    service: &'a LockService,
    key: String,
    token: OwnerToken,
    released: bool,
}

impl<'a> LockGuard<'a> {
    pub(super) fn new(service: &'a LockService, key: &str, token: OwnerToken) -> Self {
        Self {
            service,
            key: key.to_string(),
            token,
            released: false,
        }
    }

    /// The logical key this guard holds.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The owner token written for this guard.
    pub fn token(&self) -> &OwnerToken {
        &self.token
    }

    /// Release now, returning whether the record was still ours.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.service.release(&self.token, &self.key)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.service.release(&self.token, &self.key);
        }
    }
}

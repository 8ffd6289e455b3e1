//! Physical key naming and owner tokens.
//!
//! A logical key such as `rebuild` is stored under
//! `{key_prefix}{sync_namespace}{logical}` (e.g. `synclock_sync_rebuild`).
//! Logical keys are caller-chosen constants, so they are not escaped.
//!
//! An owner token has the form `{created_secs}_{logical}_{nonce}`:
//! - `created_secs` is seconds since the Unix epoch with microsecond
//!   precision (`1700000000.123456`) and is the only record of lock age
//! - `logical` is the logical key, kept as a readability hint
//! - `nonce` is 32 hex characters from the OS random generator

use crate::config::Config;
use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static FALLBACK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Resolves logical keys to physical storage keys and mints owner tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    prefix: String,
}

impl KeyCodec {
    /// Create a codec from the two fixed prefixes.
    pub fn new(key_prefix: &str, sync_namespace: &str) -> Self {
        Self {
            prefix: format!("{}{}", key_prefix, sync_namespace),
        }
    }

    /// Create a codec using the prefixes in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.key_prefix, &config.sync_namespace)
    }

    /// The physical storage key for `logical_key`.
    pub fn physical_key(&self, logical_key: &str) -> String {
        format!("{}{}", self.prefix, logical_key)
    }

    /// Mint a fresh owner token for `logical_key`, stamped with the current time.
    pub fn new_owner_token(&self, logical_key: &str) -> OwnerToken {
        OwnerToken::with_timestamp(now_secs(), logical_key)
    }
}

/// Proof of lock ownership, stored verbatim as the lock record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Build a token with an explicit creation time.
    pub fn with_timestamp(created_secs: f64, logical_key: &str) -> Self {
        Self(format!("{:.6}_{}_{}", created_secs, logical_key, random_nonce()))
    }

    /// Wrap a raw record value read back from storage.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the token, returning the raw string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Creation time parsed from the leading field.
    ///
    /// A malformed token reports the epoch, so it is always considered stale
    /// and a corrupt record cannot wedge a key forever.
    pub fn created_at_secs(&self) -> f64 {
        self.0
            .split('_')
            .next()
            .and_then(|field| field.parse::<f64>().ok())
            .filter(|secs| secs.is_finite())
            .unwrap_or(0.0)
    }

    /// Seconds elapsed between creation and `now`.
    pub fn age_secs(&self, now: f64) -> f64 {
        now - self.created_at_secs()
    }

    /// The logical key embedded between the timestamp and the nonce, if well formed.
    pub fn logical_hint(&self) -> Option<&str> {
        let (_, rest) = self.0.split_once('_')?;
        let (hint, _) = rest.rsplit_once('_')?;
        Some(hint)
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OwnerToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 128 random bits as hex, preferring the OS generator.
fn random_nonce() -> String {
    let mut bytes = [0u8; 16];
    if OsRng.try_fill_bytes(&mut bytes).is_ok() {
        return hex::encode(bytes);
    }
    if rand::thread_rng().try_fill_bytes(&mut bytes).is_ok() {
        return hex::encode(bytes);
    }
    fallback_unique_id()
}

/// Process-unique identifier used only when no random source is usable.
fn fallback_unique_id() -> String {
    let seq = FALLBACK_SEQ.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{:x}{:016x}{:x}", std::process::id(), nanos, seq)
}

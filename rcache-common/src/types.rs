//! # Shared Types
//!
//! Small value types passed between the pool, the raw store client and the
//! typed facade.

use std::fmt;
use std::time::Duration;

/// Which endpoint set a connection is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Read-write endpoints; every mutating command goes here.
    ReadWrite,
    /// Read-only endpoints (falls back to read-write when none are configured).
    ReadOnly,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::ReadWrite => f.write_str("read-write"),
            AccessMode::ReadOnly => f.write_str("read-only"),
        }
    }
}

/// TTL state of a key, mirroring the store's `PTTL` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

impl KeyTtl {
    /// Maps a raw `PTTL` integer reply (-2, -1 or remaining milliseconds).
    pub fn from_millis_reply(value: i64) -> Option<Self> {
        match value {
            -2 => Some(KeyTtl::Missing),
            -1 => Some(KeyTtl::NoExpiry),
            ms if ms >= 0 => Some(KeyTtl::ExpiresIn(Duration::from_millis(ms as u64))),
            _ => None,
        }
    }
}

/// What a best-effort write does with a failure.
///
/// `Propagate` returns the error to the caller; `Suppress` logs it and
/// reports `false` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    Propagate,
    Suppress,
}

/// Point-in-time view of one mode's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections parked in the pool.
    pub idle: usize,
    /// Connections currently checked out.
    pub in_use: usize,
    /// Configured maximum of live connections.
    pub max: usize,
}

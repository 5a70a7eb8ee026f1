//! Scalar operations: one key, one JSON-encoded value.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use rcache_common::{codec, CacheResult, CacheValue, ErrorPolicy};

use crate::client::StoreClient;

/// Scalar operation group, borrowed from a `CacheClient`.
pub struct Items<'a> {
    store: &'a StoreClient,
    default_ttl: Duration,
}

impl<'a> Items<'a> {
    pub(crate) fn new(store: &'a StoreClient, default_ttl: Duration) -> Self {
        Items { store, default_ttl }
    }

    /// Stores `value` under `key` with the default TTL (1 hour unless configured).
    pub fn set<T: CacheValue>(&self, key: &str, value: &T) -> CacheResult<()> {
        self.set_with_ttl(key, value, Some(self.default_ttl))
    }

    /// Stores `value` with an explicit TTL; `None` stores it without expiry.
    pub fn set_with_ttl<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let payload = codec::encode(value)?;
        self.store.set(key, &payload, ttl)
    }

    /// Best-effort variant of `set_with_ttl`.
    ///
    /// Returns `Ok(true)` once the value is stored. With
    /// `ErrorPolicy::Suppress` any failure is logged and reported as
    /// `Ok(false)`; with `ErrorPolicy::Propagate` it is returned as `Err`.
    pub fn set_with_policy<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        policy: ErrorPolicy,
    ) -> CacheResult<bool> {
        match self.set_with_ttl(key, value, ttl) {
            Ok(()) => Ok(true),
            Err(err) if policy == ErrorPolicy::Suppress => {
                warn!(key, error = %err, "suppressed scalar set failure");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Fetches and decodes the value under `key`; `None` when missing.
    pub fn get<T: CacheValue>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Removes `key`. Returns whether it existed.
    pub fn remove(&self, key: &str) -> CacheResult<bool> {
        self.store.delete(key)
    }

    pub fn set_expire(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        self.store.expire_at(key, at)
    }
}

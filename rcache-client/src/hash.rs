//! # Hash Operations
//!
//! Field → value maps under one key. Field names are plain strings; values
//! are JSON-encoded.
//!
//! `get_all` distinguishes "no fields" (`None`) from a populated hash so
//! callers can tell a cache miss from an empty result set.

use chrono::{DateTime, Utc};

use rcache_common::{codec, AccessMode, CacheResult, CacheValue};

use crate::client::StoreClient;
use crate::resp::Command;

/// Hash operation group, borrowed from a `CacheClient`.
pub struct Hashes<'a> {
    store: &'a StoreClient,
}

impl<'a> Hashes<'a> {
    pub(crate) fn new(store: &'a StoreClient) -> Self {
        Hashes { store }
    }

    pub fn exists(&self, key: &str, field: &str) -> CacheResult<bool> {
        let command = Command::new("HEXISTS").arg(key).arg(field);
        self.store.execute(AccessMode::ReadOnly, &command)?.into_flag()
    }

    /// Stores `value` in `field`. Returns true when the field was created,
    /// false when an existing field was overwritten.
    pub fn set<T: CacheValue>(&self, key: &str, field: &str, value: &T) -> CacheResult<bool> {
        let command = Command::new("HSET")
            .arg(key)
            .arg(field)
            .arg(codec::encode(value)?);
        self.store.execute(AccessMode::ReadWrite, &command)?.into_flag()
    }

    pub fn remove_field(&self, key: &str, field: &str) -> CacheResult<bool> {
        let command = Command::new("HDEL").arg(key).arg(field);
        self.store.execute(AccessMode::ReadWrite, &command)?.into_flag()
    }

    /// Drops the whole hash. Returns whether it existed.
    pub fn remove_all(&self, key: &str) -> CacheResult<bool> {
        self.store.delete(key)
    }

    pub fn get<T: CacheValue>(&self, key: &str, field: &str) -> CacheResult<Option<T>> {
        let command = Command::new("HGET").arg(key).arg(field);
        match self.store.execute(AccessMode::ReadOnly, &command)?.into_bulk()? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All values of the hash; `None` when it has no fields or does not exist.
    pub fn get_all<T: CacheValue>(&self, key: &str) -> CacheResult<Option<Vec<T>>> {
        let items = self
            .store
            .execute(AccessMode::ReadOnly, &Command::new("HVALS").arg(key))?
            .into_bulk_array()?;
        if items.is_empty() {
            return Ok(None);
        }
        codec::decode_all(items).map(Some)
    }

    pub fn count(&self, key: &str) -> CacheResult<u64> {
        self.store
            .execute(AccessMode::ReadOnly, &Command::new("HLEN").arg(key))?
            .into_count()
    }

    pub fn set_expire(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        self.store.expire_at(key, at)
    }
}

//! # List Operations
//!
//! Ordered lists of JSON values. Appends go to the tail, so ranges read
//! back in insertion order.

use chrono::{DateTime, Utc};

use rcache_common::{codec, AccessMode, CacheResult, CacheValue};

use crate::cache::{page_start, to_index};
use crate::client::StoreClient;
use crate::resp::Command;

/// List operation group, borrowed from a `CacheClient`.
pub struct Lists<'a> {
    store: &'a StoreClient,
}

impl<'a> Lists<'a> {
    pub(crate) fn new(store: &'a StoreClient) -> Self {
        Lists { store }
    }

    /// Appends `value` to the tail of the list.
    pub fn append<T: CacheValue>(&self, key: &str, value: &T) -> CacheResult<()> {
        let command = Command::new("RPUSH").arg(key).arg(codec::encode(value)?);
        self.store.execute(AccessMode::ReadWrite, &command)?.into_count()?;
        Ok(())
    }

    /// Removes every occurrence of `value`. Returns whether any was removed.
    pub fn remove_value<T: CacheValue>(&self, key: &str, value: &T) -> CacheResult<bool> {
        let command = Command::new("LREM")
            .arg(key)
            .arg_int(0)
            .arg(codec::encode(value)?);
        self.store.execute(AccessMode::ReadWrite, &command)?.into_flag()
    }

    /// Empties the list.
    pub fn remove_all(&self, key: &str) -> CacheResult<()> {
        self.store.delete(key)?;
        Ok(())
    }

    pub fn count(&self, key: &str) -> CacheResult<u64> {
        self.store
            .execute(AccessMode::ReadOnly, &Command::new("LLEN").arg(key))?
            .into_count()
    }

    /// Reads `count` elements starting at index `start`.
    ///
    /// The store range is inclusive: `[start, start + count - 1]`.
    pub fn range<T: CacheValue>(&self, key: &str, start: usize, count: usize) -> CacheResult<Vec<T>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let stop = start.saturating_add(count - 1);
        self.read_range(key, to_index(start), to_index(stop))
    }

    /// Reads page `page_index` (1-based) of `page_size` elements.
    pub fn page<T: CacheValue>(&self, key: &str, page_index: usize, page_size: usize) -> CacheResult<Vec<T>> {
        let start = page_start(page_index, page_size)?;
        self.range(key, start, page_size)
    }

    /// Reads the whole list.
    pub fn all<T: CacheValue>(&self, key: &str) -> CacheResult<Vec<T>> {
        self.read_range(key, 0, -1)
    }

    pub fn set_expire(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        self.store.expire_at(key, at)
    }

    fn read_range<T: CacheValue>(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<T>> {
        let command = Command::new("LRANGE").arg(key).arg_int(start).arg_int(stop);
        let items = self
            .store
            .execute(AccessMode::ReadOnly, &command)?
            .into_bulk_array()?;
        codec::decode_all(items)
    }
}

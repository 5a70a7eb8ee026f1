//! # Sorted-Set Operations
//!
//! Members are JSON-encoded and ranked by score, ascending. Ranks are
//! 0-based; page indexes are 1-based.

use chrono::{DateTime, Utc};

use rcache_common::{codec, AccessMode, CacheError, CacheResult, CacheValue};

use crate::cache::{page_start, to_index};
use crate::client::StoreClient;
use crate::resp::Command;

/// Sorted-set operation group, borrowed from a `CacheClient`.
pub struct SortedSets<'a> {
    store: &'a StoreClient,
}

impl<'a> SortedSets<'a> {
    pub(crate) fn new(store: &'a StoreClient) -> Self {
        SortedSets { store }
    }

    /// Adds `value` with `score`, or updates its score.
    ///
    /// Returns true when the member was newly added. A NaN score fails with
    /// `InvalidScore` before anything is sent.
    pub fn add<T: CacheValue>(&self, key: &str, value: &T, score: f64) -> CacheResult<bool> {
        if score.is_nan() {
            return Err(CacheError::InvalidScore(score));
        }
        let command = Command::new("ZADD")
            .arg(key)
            .arg_float(score)
            .arg(codec::encode(value)?);
        self.store.execute(AccessMode::ReadWrite, &command)?.into_flag()
    }

    pub fn remove<T: CacheValue>(&self, key: &str, value: &T) -> CacheResult<bool> {
        let command = Command::new("ZREM").arg(key).arg(codec::encode(value)?);
        self.store.execute(AccessMode::ReadWrite, &command)?.into_flag()
    }

    /// Keeps the `keep` lowest-ranked members and removes the rest.
    ///
    /// Returns the number of members removed.
    pub fn trim(&self, key: &str, keep: usize) -> CacheResult<u64> {
        let command = Command::new("ZREMRANGEBYRANK")
            .arg(key)
            .arg_int(to_index(keep))
            .arg_int(-1);
        self.store.execute(AccessMode::ReadWrite, &command)?.into_count()
    }

    pub fn count(&self, key: &str) -> CacheResult<u64> {
        self.store
            .execute(AccessMode::ReadOnly, &Command::new("ZCARD").arg(key))?
            .into_count()
    }

    /// Members ranked `[(page_index-1)*page_size, page_index*page_size - 1]`.
    ///
    /// `None` when the page is empty.
    pub fn page<T: CacheValue>(
        &self,
        key: &str,
        page_index: usize,
        page_size: usize,
    ) -> CacheResult<Option<Vec<T>>> {
        let start = page_start(page_index, page_size)?;
        if page_size == 0 {
            return Ok(None);
        }
        let stop = start.saturating_add(page_size - 1);
        self.read_ranks(key, to_index(start), to_index(stop))
    }

    /// Every member in rank order; `None` when the set is empty or missing.
    pub fn all<T: CacheValue>(&self, key: &str) -> CacheResult<Option<Vec<T>>> {
        self.read_ranks(key, 0, -1)
    }

    pub fn set_expire(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        self.store.expire_at(key, at)
    }

    fn read_ranks<T: CacheValue>(&self, key: &str, start: i64, stop: i64) -> CacheResult<Option<Vec<T>>> {
        let command = Command::new("ZRANGE").arg(key).arg_int(start).arg_int(stop);
        let items = self
            .store
            .execute(AccessMode::ReadOnly, &command)?
            .into_bulk_array()?;
        if items.is_empty() {
            return Ok(None);
        }
        codec::decode_all(items).map(Some)
    }
}

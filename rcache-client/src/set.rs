//! Unordered set operations. Membership compares the JSON encoding, so
//! equal values must serialize identically.

use chrono::{DateTime, Utc};

use rcache_common::{codec, AccessMode, CacheResult, CacheValue};

use crate::client::StoreClient;
use crate::resp::Command;

/// Set operation group, borrowed from a `CacheClient`.
pub struct Sets<'a> {
    store: &'a StoreClient,
}

impl<'a> Sets<'a> {
    pub(crate) fn new(store: &'a StoreClient) -> Self {
        Sets { store }
    }

    /// Adds `value`. Returns true when it was not already a member.
    pub fn add<T: CacheValue>(&self, key: &str, value: &T) -> CacheResult<bool> {
        self.member_command("SADD", AccessMode::ReadWrite, key, value)
    }

    pub fn contains<T: CacheValue>(&self, key: &str, value: &T) -> CacheResult<bool> {
        self.member_command("SISMEMBER", AccessMode::ReadOnly, key, value)
    }

    /// Removes `value`. Returns true when it was a member.
    pub fn remove<T: CacheValue>(&self, key: &str, value: &T) -> CacheResult<bool> {
        self.member_command("SREM", AccessMode::ReadWrite, key, value)
    }

    /// All members, in no particular order.
    pub fn members<T: CacheValue>(&self, key: &str) -> CacheResult<Vec<T>> {
        let items = self
            .store
            .execute(AccessMode::ReadOnly, &Command::new("SMEMBERS").arg(key))?
            .into_bulk_array()?;
        codec::decode_all(items)
    }

    pub fn count(&self, key: &str) -> CacheResult<u64> {
        self.store
            .execute(AccessMode::ReadOnly, &Command::new("SCARD").arg(key))?
            .into_count()
    }

    pub fn set_expire(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        self.store.expire_at(key, at)
    }

    fn member_command<T: CacheValue>(
        &self,
        name: &str,
        mode: AccessMode,
        key: &str,
        value: &T,
    ) -> CacheResult<bool> {
        let command = Command::new(name).arg(key).arg(codec::encode(value)?);
        self.store.execute(mode, &command)?.into_flag()
    }
}

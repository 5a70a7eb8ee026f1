//! # Store Client
//!
//! Purpose: Issue single store commands on pooled connections, byte in,
//! byte out. The typed facade is layered on top of this.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `StoreClient` hides pooling and protocol details.
//! 2. **Scoped Connections**: Each call checks out one connection and the
//!    handle returns it on drop, on success and error paths alike.
//! 3. **Read/Write Split**: Callers name the access mode per command.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::trace;

use rcache_common::{AccessMode, CacheConfig, CacheError, CacheResult, KeyTtl, PoolStats};

use crate::pool::PoolManager;
use crate::resp::{Command, RespValue};

/// Blocking client with read/write connection pooling.
#[derive(Clone)]
pub struct StoreClient {
    pool: PoolManager,
}

impl StoreClient {
    /// Creates a client and its pools. Connections open lazily.
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        Ok(StoreClient {
            pool: PoolManager::new(config)?,
        })
    }

    /// Wraps an existing pool manager.
    pub fn with_pool(pool: PoolManager) -> Self {
        StoreClient { pool }
    }

    pub fn pool(&self) -> &PoolManager {
        &self.pool
    }

    /// Runs one command on a connection of the given mode.
    ///
    /// Error replies from the store are returned as `CacheError::Server`.
    pub fn execute(&self, mode: AccessMode, command: &Command) -> CacheResult<RespValue> {
        let mut conn = self.pool.acquire(mode)?;
        trace!(command = command.name(), %mode, "execute");
        conn.exec(command)?.into_result()
    }

    /// Fetches a raw value. Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.execute(AccessMode::ReadOnly, &Command::new("GET").arg(key))?
            .into_bulk()
    }

    /// Stores a raw value, with an optional relative TTL.
    pub fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        let mut command = Command::new("SET").arg(key).arg(value);
        if let Some(ttl) = ttl {
            // PX 0 is rejected by the store.
            let millis = ttl.as_millis().clamp(1, i64::MAX as u128) as i64;
            command = command.arg("PX").arg_int(millis);
        }
        if self.execute(AccessMode::ReadWrite, &command)?.into_ok()? {
            Ok(())
        } else {
            Err(CacheError::UnexpectedResponse)
        }
    }

    /// Deletes a key of any shape. Returns true when a key was removed.
    pub fn delete(&self, key: &str) -> CacheResult<bool> {
        self.execute(AccessMode::ReadWrite, &Command::new("DEL").arg(key))?
            .into_flag()
    }

    pub fn exists(&self, key: &str) -> CacheResult<bool> {
        self.execute(AccessMode::ReadOnly, &Command::new("EXISTS").arg(key))?
            .into_flag()
    }

    /// Sets an absolute expiration. Returns true when the key existed.
    pub fn expire_at(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        let command = Command::new("PEXPIREAT")
            .arg(key)
            .arg_int(at.timestamp_millis());
        self.execute(AccessMode::ReadWrite, &command)?.into_flag()
    }

    /// Returns TTL status for a key.
    pub fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let value = self
            .execute(AccessMode::ReadOnly, &Command::new("PTTL").arg(key))?
            .into_integer()?;
        KeyTtl::from_millis_reply(value).ok_or(CacheError::UnexpectedResponse)
    }

    /// Pings the read-write endpoint set.
    pub fn ping(&self) -> CacheResult<()> {
        match self.execute(AccessMode::ReadWrite, &Command::new("PING"))? {
            RespValue::Simple(_) | RespValue::Bulk(Some(_)) => Ok(()),
            _ => Err(CacheError::UnexpectedResponse),
        }
    }

    pub fn pool_stats(&self, mode: AccessMode) -> PoolStats {
        self.pool.stats(mode)
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

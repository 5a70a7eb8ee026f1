//! # Typed Cache Facade
//!
//! Purpose: One entry point for typed access to every container shape the
//! store offers.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `CacheClient` owns the store client; operation
//!    groups borrow it and add the per-shape encoding.
//! 2. **Read/Write Split**: Reads go to the read-only pool, writes to the
//!    read-write pool.
//! 3. **Explicit Absence**: Missing keys come back as `None`, never as a
//!    zero value or an empty collection standing in for "missing".
//! 4. **Errors Propagate**: The only suppression is the opt-in
//!    `ErrorPolicy::Suppress` on `Items::set_with_policy`.
//!
//! ## Usage
//!
//! ```no_run
//! use rcache_client::{CacheClient, CacheConfig};
//!
//! let config = CacheConfig::from_hosts("10.0.0.1:6379", "10.0.0.2:6379;10.0.0.3:6379")?;
//! let cache = CacheClient::new(&config)?;
//!
//! cache.items().set("batch", &"89B0BD4B".to_string())?;
//! let batch: Option<String> = cache.items().get("batch")?;
//!
//! cache.lists().append("recent", &42u32)?;
//! let first_page: Vec<u32> = cache.lists().page("recent", 1, 10)?;
//! # Ok::<(), rcache_client::CacheError>(())
//! ```

use std::time::Duration;

use rcache_common::{AccessMode, CacheConfig, CacheError, CacheResult, KeyTtl, PoolStats};

use crate::client::StoreClient;
use crate::hash::Hashes;
use crate::item::Items;
use crate::list::Lists;
use crate::set::Sets;
use crate::sorted_set::SortedSets;

/// Typed facade over a pooled store connection set.
///
/// Cheap to clone; clones share the same pools.
#[derive(Clone)]
pub struct CacheClient {
    store: StoreClient,
    default_ttl: Duration,
}

impl CacheClient {
    /// Creates the facade and its pools from `config`.
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        Ok(CacheClient {
            store: StoreClient::new(config)?,
            default_ttl: config.default_ttl,
        })
    }

    /// Creates the facade from `RCACHE_*` environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::new(&CacheConfig::from_env()?)
    }

    /// Wraps an existing store client.
    pub fn with_store(store: StoreClient, default_ttl: Duration) -> Self {
        CacheClient { store, default_ttl }
    }

    pub fn items(&self) -> Items<'_> {
        Items::new(&self.store, self.default_ttl)
    }

    pub fn lists(&self) -> Lists<'_> {
        Lists::new(&self.store)
    }

    pub fn sets(&self) -> Sets<'_> {
        Sets::new(&self.store)
    }

    pub fn hashes(&self) -> Hashes<'_> {
        Hashes::new(&self.store)
    }

    pub fn sorted_sets(&self) -> SortedSets<'_> {
        SortedSets::new(&self.store)
    }

    /// Underlying byte-level client.
    pub fn store(&self) -> &StoreClient {
        &self.store
    }

    pub fn exists(&self, key: &str) -> CacheResult<bool> {
        self.store.exists(key)
    }

    pub fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        self.store.ttl(key)
    }

    pub fn ping(&self) -> CacheResult<()> {
        self.store.ping()
    }

    pub fn pool_stats(&self, mode: AccessMode) -> PoolStats {
        self.store.pool_stats(mode)
    }

    /// Closes the pools; every later operation fails with `PoolClosed`.
    pub fn shutdown(&self) {
        self.store.shutdown();
    }
}

/// First 0-based index of page `page_index` (1-based) of `page_size` items.
pub(crate) fn page_start(page_index: usize, page_size: usize) -> CacheResult<usize> {
    page_index
        .checked_sub(1)
        .and_then(|page| page.checked_mul(page_size))
        .ok_or(CacheError::InvalidPage { page_index })
}

/// Store-side index argument; values beyond `i64::MAX` saturate.
pub(crate) fn to_index(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

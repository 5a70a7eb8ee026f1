//! # rcache Client
//!
//! Purpose: Provide typed, blocking access to a Redis-compatible store with
//! read/write-split connection pooling.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP connections per access mode.
//! 2. **Facade Pattern**: `CacheClient` exposes one operation group per
//!    container shape (scalar, list, set, hash, sorted set).
//! 3. **Serde Contract**: Values cross the wire as JSON via `CacheValue`.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.

mod cache;
mod client;
mod hash;
mod item;
mod list;
mod pool;
pub mod resp;
mod set;
mod sorted_set;

pub use cache::CacheClient;
pub use client::StoreClient;
pub use hash::Hashes;
pub use item::Items;
pub use list::Lists;
pub use pool::{PoolManager, PooledConnection};
pub use set::Sets;
pub use sorted_set::SortedSets;

pub use rcache_common::{
    AccessMode, CacheConfig, CacheError, CacheResult, CacheValue, Endpoint, ErrorPolicy, KeyTtl,
    PoolStats,
};

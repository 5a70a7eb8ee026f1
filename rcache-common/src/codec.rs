//! # Value Codec
//!
//! Purpose: Turn typed values into the text payloads stored under a key and
//! back again.
//!
//! ## Design Principles
//! 1. **Compile-Time Contract**: Only `CacheValue` types reach the store.
//! 2. **One Format**: JSON on both write and read paths, for every shape.
//! 3. **Loud Failures**: Encode/decode errors surface as
//!    `CacheError::Serialization`; nothing is dropped silently.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheResult;

/// Contract for values stored through the typed facade.
///
/// Implemented for every serde round-trippable type.
pub trait CacheValue: Serialize + DeserializeOwned {}

impl<T> CacheValue for T where T: Serialize + DeserializeOwned {}

/// Encodes a value into its stored JSON bytes.
pub fn encode<T: CacheValue>(value: &T) -> CacheResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes stored JSON bytes into a value.
pub fn decode<T: CacheValue>(bytes: &[u8]) -> CacheResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes every element of a multi-value reply, failing on the first bad one.
pub fn decode_all<T: CacheValue>(items: Vec<Vec<u8>>) -> CacheResult<Vec<T>> {
    items.iter().map(|item| decode(item)).collect()
}

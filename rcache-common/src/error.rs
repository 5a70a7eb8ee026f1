//! # Error Taxonomy
//!
//! One error type for the whole client: pool, transport, protocol and
//! serialization failures. Absence of a key is never an error; operations
//! return `Option` for that.

use thiserror::Error;

use crate::types::AccessMode;

/// Result type for every cache operation.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by the pool manager and the typed facade.
#[derive(Debug, Error)]
pub enum CacheError {
    /// None of the endpoints configured for a mode accepted a connection.
    #[error("no {mode} endpoint reachable after {attempted} attempt(s): {last}")]
    Connectivity {
        mode: AccessMode,
        attempted: usize,
        last: String,
    },

    /// No connection slot freed within the acquire wait bound.
    #[error("{mode} connection pool exhausted ({max} connections in use)")]
    PoolExhausted { mode: AccessMode, max: usize },

    /// The pool manager was shut down.
    #[error("connection pool is shut down")]
    PoolClosed,

    /// Network or IO failure on an established connection.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// RESP2 framing or parse error.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// Store returned an error reply.
    #[error("server error: {0}")]
    Server(String),

    /// Reply type did not match the command that was sent.
    #[error("unexpected response")]
    UnexpectedResponse,

    /// Value could not be encoded to or decoded from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Endpoint string could not be parsed.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Page indexes are 1-based.
    #[error("invalid page index {page_index}: pages start at 1")]
    InvalidPage { page_index: usize },

    /// Sorted-set scores must be numbers; infinities are allowed.
    #[error("invalid score {0}: scores cannot be NaN")]
    InvalidScore(f64),
}

impl CacheError {
    /// True for failures that leave the connection's framing state unknown.
    ///
    /// Such connections must not go back to the pool.
    pub fn poisons_connection(&self) -> bool {
        matches!(self, CacheError::Io(_) | CacheError::Protocol(_))
    }
}

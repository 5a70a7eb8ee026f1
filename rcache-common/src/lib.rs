// rcache-common - Shared types for the rcache client facade
//
// Errors, endpoint configuration and the JSON value codec used by every
// container-type operation.

pub mod codec;
pub mod config;
pub mod error;
pub mod types;

// Re-export for convenience
pub use codec::*;
pub use config::*;
pub use error::*;
pub use types::*;

// sstore-common - Shared types for secondary cache storage backends
//
// This crate defines the digest, error taxonomy and storage trait that every
// backend implements and the primary cache tier calls into.

pub mod error;
pub mod storage;
pub mod types;

// Re-export for convenience
pub use error::*;
pub use storage::*;
pub use types::*;

//! # Storage Error Taxonomy
//!
//! The calling cache tier treats a missing value as a normal miss and any
//! error as a reason to fall back or skip replication. Misses are therefore
//! never errors: they travel in the `Ok` side of [`StorageResult`].

use thiserror::Error;

/// Result type returned by every secondary storage operation.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of a remote storage interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum StorageError {
    /// Connect or operation phase exceeded its configured bound.
    #[error("secondary storage timed out")]
    Timeout,
    /// Any other failure: refused connection, bad reply, rejected
    /// credentials, invalid configuration.
    #[error("secondary storage error")]
    Error,
}

impl StorageError {
    /// Returns true for the timeout variant.
    #[inline]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, StorageError::Timeout)
    }
}

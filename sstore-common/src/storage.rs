//! # Secondary Storage Interface
//!
//! Purpose: The contract between the primary cache tier and a remote backend.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: Backends are interchangeable behind one trait.
//! 2. **Miss Is Not Failure**: `Ok(None)` / `Ok(false)` carry the expected
//!    absent outcomes; `Err` is reserved for failed interactions.
//! 3. **Exclusive Access**: Methods take `&mut self` because a backend owns an
//!    unsynchronized session; share it behind an external lock if needed.

use crate::error::StorageResult;
use crate::types::Digest;

/// Remote key-value tier consulted on local cache misses.
pub trait SecondaryStorage {
    /// Reads the value stored for `key`.
    ///
    /// Returns `Ok(None)` when the key is absent.
    fn fetch(&mut self, key: &Digest) -> StorageResult<Option<Vec<u8>>>;

    /// Writes `value` for `key`.
    ///
    /// With `only_if_absent` set an existing value is left untouched and
    /// `Ok(false)` is returned. `Ok(true)` means the value was written.
    fn store(&mut self, key: &Digest, value: &[u8], only_if_absent: bool) -> StorageResult<bool>;

    /// Removes `key`. Returns false when nothing was stored for it.
    fn delete(&mut self, key: &Digest) -> StorageResult<bool>;
}

//! # Digest and Attribute Types
//!
//! Data types shared by the cache tier and its storage backends.
//!
//! ## Design Principles
//!
//! 1. **Fixed Size**: A digest is a 20-byte array, copied by value and never
//!    heap allocated.
//! 2. **Canonical Text Form**: `Display` renders lowercase hex. Distinct
//!    digests always render to distinct strings, so the text form is safe to
//!    use as a storage key.
//! 3. **Opaque Attributes**: Backend options arrive as a string map and each
//!    backend picks the entries it understands.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Digest size in bytes (160 bits)
pub const DIGEST_SIZE: usize = 20;

/// Named backend options, e.g. `connect-timeout` or `password`.
pub type AttributeMap = HashMap<String, String>;

/// Error returned when parsing a digest from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestParseError {
    #[error("digest must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("digest contains a non-hex character")]
    InvalidCharacter,
}

/// Content fingerprint identifying a cached artifact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Wraps raw digest bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Digest(bytes)
    }

    /// Parses the canonical lowercase (or uppercase) hex form.
    ///
    /// # Errors
    /// Returns `DigestParseError` if the input is not exactly
    /// `2 * DIGEST_SIZE` hex characters.
    pub fn from_hex(text: &str) -> Result<Self, DigestParseError> {
        if text.len() != DIGEST_SIZE * 2 {
            return Err(DigestParseError::InvalidLength {
                expected: DIGEST_SIZE * 2,
                actual: text.len(),
            });
        }
        let mut bytes = [0u8; DIGEST_SIZE];
        hex::decode_to_slice(text, &mut bytes).map_err(|_| DigestParseError::InvalidCharacter)?;
        Ok(Digest(bytes))
    }

    /// Returns the raw digest bytes
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Digest(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_lowercase_hex() {
        let mut bytes = [0u8; DIGEST_SIZE];
        bytes[0] = 0xab;
        bytes[DIGEST_SIZE - 1] = 0x0f;
        let digest = Digest::from_bytes(bytes);
        let text = digest.to_string();
        assert_eq!(text.len(), DIGEST_SIZE * 2);
        assert!(text.starts_with("ab"));
        assert!(text.ends_with("0f"));
    }

    #[test]
    fn test_from_hex() {
        let text = "00112233445566778899aabbccddeeff00112233";
        let digest = Digest::from_hex(text).unwrap();
        assert_eq!(digest.to_string(), text);
        assert_eq!(digest.as_bytes()[1], 0x11);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert_eq!(
            Digest::from_hex("abcd"),
            Err(DigestParseError::InvalidLength { expected: 40, actual: 4 })
        );
        let bad = "zz112233445566778899aabbccddeeff00112233";
        assert_eq!(Digest::from_hex(bad), Err(DigestParseError::InvalidCharacter));
    }

    #[test]
    fn test_distinct_digests_render_distinct() {
        let a = Digest::from_bytes([1u8; DIGEST_SIZE]);
        let mut bytes = [1u8; DIGEST_SIZE];
        bytes[DIGEST_SIZE - 1] = 2;
        let b = Digest::from_bytes(bytes);
        assert_ne!(a, b);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_debug() {
        let digest = Digest::default();
        assert_eq!(format!("{:?}", digest), format!("Digest({})", "0".repeat(40)));
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier for any stored record.
///
/// A `Hash` is the BLAKE3 hash of a record's serialized content. Identical
/// content always produces the same `Hash`, making records deduplicatable
/// and reproducible.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Compute a `Hash` from raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create a `Hash` from a pre-computed 32-byte digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// The "beginning of time" sentinel (all zeros).
    ///
    /// This is the parent of the first commit on every branch of descent.
    /// No record is ever stored under this hash.
    pub const fn no_ancestor() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the no-ancestor sentinel.
    pub fn is_no_ancestor(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation (lowercase).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters), for log output.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    ///
    /// Odd-length or non-hex input is rejected with
    /// [`TypeError::InvalidHex`]; a valid hex string of the wrong length is
    /// rejected with [`TypeError::InvalidLength`].
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash {
    fn from(digest: [u8; 32]) -> Self {
        Self(digest)
    }
}

impl From<Hash> for [u8; 32] {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_bytes_is_deterministic() {
        let data = b"table metadata pointer";
        let h1 = Hash::of_bytes(data);
        let h2 = Hash::of_bytes(data);
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_data_produces_different_hashes() {
        let h1 = Hash::of_bytes(b"v1");
        let h2 = Hash::of_bytes(b"v2");
        assert_ne!(h1, h2);
    }

    #[test]
    fn no_ancestor_is_all_zeros() {
        let root = Hash::no_ancestor();
        assert!(root.is_no_ancestor());
        assert_eq!(root.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn hex_roundtrip() {
        let h = Hash::of_bytes(b"roundtrip");
        let parsed = Hash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn odd_length_hex_is_rejected() {
        let err = Hash::from_hex("abc").unwrap_err();
        assert!(matches!(err, TypeError::InvalidHex(_)));
    }

    #[test]
    fn non_hex_input_is_rejected() {
        let err = Hash::from_hex("zz").unwrap_err();
        assert!(matches!(err, TypeError::InvalidHex(_)));
    }

    #[test]
    fn wrong_length_hex_is_rejected() {
        let err = Hash::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn display_is_full_lowercase_hex() {
        let h = Hash::of_bytes(b"display");
        let rendered = format!("{h}");
        assert_eq!(rendered.len(), 64);
        assert_eq!(rendered, rendered.to_lowercase());
    }

    #[test]
    fn serde_roundtrip() {
        let h = Hash::of_bytes(b"serde");
        let json = serde_json::to_string(&h).unwrap();
        let parsed: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, parsed);
    }
}

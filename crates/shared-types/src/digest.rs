//! # Canonical Hashing
//!
//! Length-prefixed SHA-256 encoding used for transaction and docket ids.
//! Variable-length fields are prefixed with their length so that adjacent
//! fields can never be re-split into a colliding encoding.

use crate::entities::Hash;
use sha2::{Digest, Sha256};

/// Incremental SHA-256 hasher with canonical field encoding.
pub struct CanonicalHasher {
    inner: Sha256,
}

impl CanonicalHasher {
    /// Create a hasher bound to a domain tag.
    pub fn new(domain: &str) -> Self {
        let mut hasher = Self {
            inner: Sha256::new(),
        };
        hasher.write_str(domain);
        hasher
    }

    /// Write a length-prefixed byte string.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> &mut Self {
        self.write_bytes(value.as_bytes())
    }

    /// Write a fixed-width integer.
    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.inner.update(value.to_le_bytes());
        self
    }

    /// Write a 32-byte hash without prefix.
    pub fn write_hash(&mut self, hash: &Hash) -> &mut Self {
        self.inner.update(hash);
        self
    }

    /// Write an optional hash as a presence flag followed by the value.
    pub fn write_opt_hash(&mut self, hash: Option<&Hash>) -> &mut Self {
        match hash {
            Some(h) => {
                self.inner.update([1u8]);
                self.inner.update(h);
            }
            None => self.inner.update([0u8]),
        }
        self
    }

    /// Write an optional string as a presence flag followed by the value.
    pub fn write_opt_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => {
                self.inner.update([1u8]);
                self.write_str(v);
            }
            None => self.inner.update([0u8]),
        }
        self
    }

    /// Write a JSON value in its canonical serialized form.
    ///
    /// `serde_json` object maps are ordered by key, so the encoding does not
    /// depend on the order fields were inserted.
    pub fn write_json(&mut self, value: &serde_json::Value) -> &mut Self {
        let encoded = serde_json::to_vec(value).unwrap_or_default();
        self.write_bytes(&encoded)
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Hash {
        let result = self.inner.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }
}

/// Hex-encode the first four bytes of a hash for log output.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..4])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_length_prefix_prevents_resplit() {
        let mut a = CanonicalHasher::new("test");
        a.write_str("ab").write_str("c");
        let mut b = CanonicalHasher::new("test");
        b.write_str("a").write_str("bc");
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_json_key_order_is_irrelevant() {
        let first: serde_json::Value =
            serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        let second = json!({"a": 1, "b": 2});

        let mut a = CanonicalHasher::new("json");
        a.write_json(&first);
        let mut b = CanonicalHasher::new("json");
        b.write_json(&second);
        assert_eq!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_short_hex() {
        assert_eq!(short_hex(&[0xAB; 32]), "abababab");
    }
}

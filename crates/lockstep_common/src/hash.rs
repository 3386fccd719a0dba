//! Digests of committed simulation state.
//!
//! Two runs of the same design are compared cycle by cycle through these
//! digests instead of full snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit XXH3 digest of a committed signal store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateDigest([u8; 16]);

impl StateDigest {
    /// Computes a digest from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateDigest({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Streaming builder for a [`StateDigest`].
///
/// Feeding the same sequence of updates always yields the same digest, so
/// callers must feed signals in a stable order (signal ID order).
pub struct DigestBuilder {
    hasher: Xxh3,
}

impl DigestBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            hasher: Xxh3::new(),
        }
    }

    /// Feeds raw bytes.
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Feeds a little-endian `u64`.
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(&value.to_le_bytes());
    }

    /// Finishes the digest.
    pub fn finish(&self) -> StateDigest {
        StateDigest(self.hasher.digest128().to_le_bytes())
    }
}

impl Default for DigestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = StateDigest::from_bytes(b"cycle 3");
        let b = StateDigest::from_bytes(b"cycle 3");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = StateDigest::from_bytes(b"valid=1");
        let b = StateDigest::from_bytes(b"valid=0");
        assert_ne!(a, b);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let mut builder = DigestBuilder::new();
        builder.update(b"abc");
        builder.update(b"def");
        assert_eq!(builder.finish(), StateDigest::from_bytes(b"abcdef"));
    }

    #[test]
    fn update_order_matters() {
        let mut a = DigestBuilder::new();
        a.update_u64(1);
        a.update_u64(2);
        let mut b = DigestBuilder::new();
        b.update_u64(2);
        b.update_u64(1);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn display_format() {
        let h = StateDigest::from_bytes(b"test");
        let s = format!("{h}");
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn serde_roundtrip() {
        let h = StateDigest::from_bytes(b"serde test");
        let json = serde_json::to_string(&h).unwrap();
        let back: StateDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}

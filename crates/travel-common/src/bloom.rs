//! Insert-only bloom filter over citizen ids.
//!
//! Bit positions are derived from a SHA-256 digest of the key, so the
//! coordinator can check a filter that a worker process built and shipped
//! over the wire.

use sha2::{Digest, Sha256};

use crate::constants::BLOOM_HASH_COUNT;

/// Probabilistic set: no false negatives, possible false positives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Create an empty filter of `size_bytes` bytes (8 bits per byte).
    pub fn new(size_bytes: usize) -> Self {
        Self {
            bits: vec![0u8; size_bytes.max(1)],
        }
    }

    /// Rebuild a filter from its serialized bit array.
    pub fn from_bytes(bits: Vec<u8>) -> Self {
        if bits.is_empty() {
            return Self::new(1);
        }
        Self { bits }
    }

    /// Serialized bit array
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Size of the bit array in bytes
    pub fn size_bytes(&self) -> usize {
        self.bits.len()
    }

    pub fn insert(&mut self, key: &str) {
        for bit in self.positions(key) {
            self.bits[bit / 8] |= 1 << (bit % 8);
        }
    }

    /// False means definitely absent; true means maybe present.
    pub fn may_contain(&self, key: &str) -> bool {
        self.positions(key)
            .all(|bit| self.bits[bit / 8] & (1 << (bit % 8)) != 0)
    }

    /// Replace the bit array with a newer snapshot.
    pub fn overwrite(&mut self, bits: Vec<u8>) {
        *self = Self::from_bytes(bits);
    }

    // Kirsch-Mitzenmacher double hashing over two halves of the digest.
    fn positions(&self, key: &str) -> impl Iterator<Item = usize> + use<> {
        let digest = Sha256::digest(key.as_bytes());
        let mut h1 = [0u8; 8];
        let mut h2 = [0u8; 8];
        h1.copy_from_slice(&digest[0..8]);
        h2.copy_from_slice(&digest[8..16]);
        let h1 = u64::from_le_bytes(h1);
        let h2 = u64::from_le_bytes(h2) | 1;
        let bit_count = (self.bits.len() * 8) as u64;

        (0..BLOOM_HASH_COUNT as u64)
            .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % bit_count) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let mut bloom = BloomFilter::new(1024);
        let ids: Vec<String> = (0..500).map(|i| format!("{:05}", i)).collect();

        for id in &ids {
            bloom.insert(id);
        }

        assert!(ids.iter().all(|id| bloom.may_contain(id)));
    }

    #[test]
    fn test_empty_filter_rejects() {
        let bloom = BloomFilter::new(128);
        assert!(!bloom.may_contain("00001"));
    }

    #[test]
    fn test_snapshot_preserves_membership() {
        let mut bloom = BloomFilter::new(64);
        bloom.insert("12345");

        let copy = BloomFilter::from_bytes(bloom.as_bytes().to_vec());
        assert!(copy.may_contain("12345"));
        assert_eq!(copy, bloom);
    }

    #[test]
    fn test_overwrite_takes_newer_bits() {
        let mut cached = BloomFilter::new(64);
        let mut fresh = BloomFilter::new(64);
        fresh.insert("777");

        cached.overwrite(fresh.as_bytes().to_vec());
        assert!(cached.may_contain("777"));
    }
}

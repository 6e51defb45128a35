//! Bloom filter for table lookups
//!
//! Double hashing over two CRC32 streams with different seeds.
//! Serialized as `num_hashes (4, LE)` followed by the bit array.

use bytes::Buf;

use crate::error::{HostKvError, Result};

const SECOND_SEED: u32 = 0x9747_b28c;

pub struct BloomFilter {
    bits: Vec<u8>,
    num_bits: usize,
    num_hash_functions: usize,
}

impl BloomFilter {
    pub fn new(bits_per_key: usize, num_keys: usize) -> Self {
        let num_bits = std::cmp::max(64, bits_per_key * num_keys);
        let num_bytes = (num_bits + 7) / 8;
        let num_hash_functions = (bits_per_key as f64 * 0.69) as usize;

        Self {
            bits: vec![0; num_bytes],
            num_bits: num_bytes * 8,
            num_hash_functions: num_hash_functions.clamp(1, 30),
        }
    }

    #[inline]
    fn hashes(key: &[u8]) -> (usize, usize) {
        let h1 = crc32fast::hash(key);
        let mut second = crc32fast::Hasher::new_with_initial(SECOND_SEED);
        second.update(key);
        let h2 = second.finalize() | 1;
        (h1 as usize, h2 as usize)
    }

    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = Self::hashes(key);
        for i in 0..self.num_hash_functions {
            let bit_pos = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            self.bits[bit_pos / 8] |= 1 << (bit_pos % 8);
        }
    }

    /// False means the key is definitely absent
    pub fn contains(&self, key: &[u8]) -> bool {
        let (h1, h2) = Self::hashes(key);
        (0..self.num_hash_functions).all(|i| {
            let bit_pos = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            self.bits[bit_pos / 8] & (1 << (bit_pos % 8)) != 0
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.bits.len());
        out.extend_from_slice(&(self.num_hash_functions as u32).to_le_bytes());
        out.extend_from_slice(&self.bits);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 5 {
            return Err(HostKvError::Corruption("bloom block too short".into()));
        }
        let mut header = &bytes[..4];
        let num_hash_functions = header.get_u32_le() as usize;
        if num_hash_functions == 0 || num_hash_functions > 30 {
            return Err(HostKvError::Corruption(format!(
                "bloom block has {} hash functions",
                num_hash_functions
            )));
        }
        let bits = bytes[4..].to_vec();
        Ok(Self {
            num_bits: bits.len() * 8,
            bits,
            num_hash_functions,
        })
    }
}

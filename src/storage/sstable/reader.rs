//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::sync::Arc;

use bytes::{Buf, Bytes};

use crate::env::{AccessFlags, Env, EnvFile};
use crate::error::{HostKvError, Result};
use crate::memtable::MemTableEntry;
use crate::storage::bloom::BloomFilter;
use crate::storage::cache::BlockCache;
use crate::storage::compression::{self, CompressionType};

use super::iterator::SSTableIterator;
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    id: u64,
    path: String,
    /// File handle for reading entries
    pub(super) file: BufReader<EnvFile>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    bloom: Option<BloomFilter>,
    compression: CompressionType,
    cache: Arc<BlockCache>,
    entry_count: u64,
    /// Index block starting offset (end of data)
    pub(super) index_offset: u64,
    pub(super) data_crc: u32,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Loads the index and the bloom filter into memory.
    pub fn open(env: Arc<dyn Env>, path: &str, id: u64, cache: Arc<BlockCache>) -> Result<Self> {
        let file_size = env.file_size(path)?;
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(HostKvError::Corruption(format!(
                "SSTable {} too small: {} bytes",
                path, file_size
            )));
        }

        let mut file = EnvFile::open(env, path, AccessFlags::READ)?;

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(HostKvError::Corruption(format!(
                "Invalid SSTable magic in {}: {:?}",
                path,
                &header[0..4]
            )));
        }

        let mut fields = &header[4..];
        let version = fields.get_u16_le();
        if version != VERSION {
            return Err(HostKvError::Corruption(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }
        let compression = CompressionType::try_from(fields.get_u8())?;
        let entry_count = fields.get_u64_le();

        // Footer
        file.seek(SeekFrom::Start(file_size - FOOTER_SIZE))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let mut fields = &footer[..];
        let index_offset = fields.get_u64_le();
        let bloom_offset = fields.get_u64_le();
        let data_crc = fields.get_u32_le();

        let footer_start = file_size - FOOTER_SIZE;
        if index_offset < HEADER_SIZE || bloom_offset < index_offset || bloom_offset > footer_start
        {
            return Err(HostKvError::Corruption(format!(
                "SSTable {} has a bad footer",
                path
            )));
        }

        // Index block
        file.seek(SeekFrom::Start(index_offset))?;
        let mut index_data = vec![0u8; (bloom_offset - index_offset) as usize];
        file.read_exact(&mut index_data)?;
        let index = parse_index(&index_data, path)?;
        if index.len() as u64 != entry_count {
            return Err(HostKvError::Corruption(format!(
                "SSTable {} index has {} keys, header says {}",
                path,
                index.len(),
                entry_count
            )));
        }

        // Bloom block
        let bloom_len = footer_start - bloom_offset;
        let bloom = if bloom_len > 0 {
            let mut bloom_data = vec![0u8; bloom_len as usize];
            file.read_exact(&mut bloom_data)?;
            Some(BloomFilter::from_bytes(&bloom_data)?)
        } else {
            None
        };

        Ok(Self {
            id,
            path: path.to_string(),
            file: BufReader::new(file),
            index,
            bloom,
            compression,
            cache,
            entry_count,
            index_offset,
            data_crc,
        })
    }

    /// Get the entry for a key — O(log n) lookup via in-memory index
    ///
    /// Returns `Ok(None)` when the key is not in this table.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };
        self.entry_at(offset).map(Some)
    }

    /// First entry with key strictly after `key` (`None` = first entry)
    pub fn next_after(&mut self, key: Option<&[u8]>) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let lower = match key {
            Some(k) => Bound::Excluded(k),
            None => Bound::Unbounded,
        };
        let found = self
            .index
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, &off)| (k.clone(), off));
        self.load(found)
    }

    /// First entry with key at or after `key`
    pub fn at_or_after(&mut self, key: &[u8]) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let found = self
            .index
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, &off)| (k.clone(), off));
        self.load(found)
    }

    /// Last entry with key strictly before `key` (`None` = last entry)
    pub fn prev_before(&mut self, key: Option<&[u8]>) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let upper = match key {
            Some(k) => Bound::Excluded(k),
            None => Bound::Unbounded,
        };
        let found = self
            .index
            .range::<[u8], _>((Bound::Unbounded, upper))
            .next_back()
            .map(|(k, &off)| (k.clone(), off));
        self.load(found)
    }

    fn load(&mut self, found: Option<(Vec<u8>, u64)>) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        match found {
            Some((key, offset)) => Ok(Some((key, self.entry_at(offset)?))),
            None => Ok(None),
        }
    }

    /// Read the value part of the entry at `offset`, through the block cache
    fn entry_at(&mut self, offset: u64) -> Result<MemTableEntry> {
        if let Some(value) = self.cache.get(self.id, offset) {
            return Ok(MemTableEntry::Value(value.to_vec()));
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;
        let mut fields = &header[..];
        let key_len = fields.get_u32_le();
        let val_len = fields.get_u32_le();

        if val_len == TOMBSTONE_MARKER {
            return Ok(MemTableEntry::Tombstone);
        }

        // Skip the key (we already know it matches)
        self.file.seek_relative(key_len as i64)?;
        let mut stored = vec![0u8; val_len as usize];
        self.file.read_exact(&mut stored)?;

        let value = compression::decompress(&stored, self.compression)?;
        self.cache.insert(self.id, offset, Bytes::from(value.clone()));
        Ok(MemTableEntry::Value(value))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable
    ///
    /// Returns false only if the key is definitely absent: outside
    /// [min_key, max_key], or rejected by the bloom filter.
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let in_range = match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        };
        in_range && self.bloom.as_ref().map_or(true, |bloom| bloom.contains(key))
    }

    /// Create an iterator over all entries (for compaction, verification)
    ///
    /// The data checksum is verified once the iterator reaches the end.
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(self)
    }
}

/// Parse index entries: [key_len(4)][offset(8)][key]
fn parse_index(mut data: &[u8], path: &str) -> Result<BTreeMap<Vec<u8>, u64>> {
    let mut index = BTreeMap::new();
    while data.has_remaining() {
        if data.remaining() < 12 {
            return Err(HostKvError::Corruption(format!(
                "SSTable {} index truncated",
                path
            )));
        }
        let key_len = data.get_u32_le() as usize;
        let offset = data.get_u64_le();
        if data.remaining() < key_len {
            return Err(HostKvError::Corruption(format!(
                "SSTable {} index truncated",
                path
            )));
        }
        let key = data[..key_len].to_vec();
        data.advance(key_len);
        index.insert(key, offset);
    }
    Ok(index)
}

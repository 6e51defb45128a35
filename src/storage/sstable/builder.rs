//! Table builder
//!
//! Streams sorted entries into a new table file through the environment.

use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::sync::Arc;

use crate::env::{AccessFlags, Env, EnvFile};
use crate::error::{HostKvError, Result};
use crate::storage::bloom::BloomFilter;
use crate::storage::compression;

use super::{
    SSTable, TableOptions, COUNT_OFFSET, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER,
    VERSION,
};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    env: Arc<dyn Env>,
    path: String,
    options: TableOptions,
    /// Buffered so each entry does not become its own host write
    writer: BufWriter<EnvFile>,
    entry_count: u64,
    /// Offset the next entry will land at
    current_offset: u64,
    /// Every key with the offset of its entry
    index: Vec<(Vec<u8>, u64)>,
    /// CRC over the whole data block
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Start a table at `path`, truncating anything already there.
    ///
    /// The header goes out immediately with a zero count; `finish` patches it.
    pub fn new(env: Arc<dyn Env>, path: &str, options: TableOptions) -> Result<Self> {
        let file = EnvFile::open(
            Arc::clone(&env),
            path,
            AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE,
        )?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);

        let mut header = [0u8; HEADER_SIZE as usize];
        header[..4].copy_from_slice(MAGIC);
        header[4..6].copy_from_slice(&VERSION.to_le_bytes());
        header[6] = options.compression as u8;
        writer.write_all(&header)?;

        Ok(Self {
            env,
            path: path.to_string(),
            options,
            writer,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append a live entry; keys must be strictly increasing
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let stored = compression::compress(value, self.options.compression)?;
        self.write_entry(key, Some(&stored))
    }

    /// Append a deletion marker
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    /// `None` writes a tombstone
    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if matches!(self.index.last(), Some((last, _)) if key <= last.as_slice()) {
            return Err(HostKvError::InvalidArgument(format!(
                "keys out of order in {}",
                self.path
            )));
        }

        let value_len = value.map_or(TOMBSTONE_MARKER, |v| v.len() as u32);
        let mut frame = Vec::with_capacity(8 + key.len() + value.map_or(0, <[u8]>::len));
        frame.extend_from_slice(&(key.len() as u32).to_le_bytes());
        frame.extend_from_slice(&value_len.to_le_bytes());
        frame.extend_from_slice(key);
        frame.extend_from_slice(value.unwrap_or_default());

        self.writer.write_all(&frame)?;
        self.data_hasher.update(&frame);

        self.index.push((key.to_vec(), self.current_offset));
        self.current_offset += frame.len() as u64;
        self.entry_count += 1;
        Ok(())
    }

    /// Write the index, bloom block and footer, then patch the header count
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.current_offset;

        let mut index_block = Vec::new();
        for (key, offset) in &self.index {
            index_block.extend_from_slice(&(key.len() as u32).to_le_bytes());
            index_block.extend_from_slice(&offset.to_le_bytes());
            index_block.extend_from_slice(key);
        }
        self.writer.write_all(&index_block)?;

        let bloom_offset = index_offset + index_block.len() as u64;
        let bloom_block = match self.options.bloom_bits_per_key {
            Some(bits_per_key) if !self.index.is_empty() => {
                let mut filter = BloomFilter::new(bits_per_key, self.index.len());
                self.index.iter().for_each(|(key, _)| filter.insert(key));
                filter.to_bytes()
            }
            _ => Vec::new(),
        };
        self.writer.write_all(&bloom_block)?;

        let mut footer = [0u8; FOOTER_SIZE as usize];
        footer[..8].copy_from_slice(&index_offset.to_le_bytes());
        footer[8..16].copy_from_slice(&bloom_offset.to_le_bytes());
        footer[16..20].copy_from_slice(&self.data_hasher.finalize().to_le_bytes());
        self.writer.write_all(&footer)?;
        self.writer.flush()?;

        let mut file = self.writer.into_inner().map_err(|e| {
            HostKvError::Io(format!("flushing table {}: {}", self.path, e.error()))
        })?;
        file.seek(SeekFrom::Start(COUNT_OFFSET))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.close()?;

        let file_size = self.env.file_size(&self.path)?;
        let (min_key, max_key) = match (self.index.first(), self.index.last()) {
            (Some((first, _)), Some((last, _))) => (first.clone(), last.clone()),
            _ => (Vec::new(), Vec::new()),
        };

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}

//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::io::{Read, Seek, SeekFrom};

use bytes::Buf;

use crate::error::{HostKvError, Result};
use crate::memtable::MemTableEntry;
use crate::storage::compression;

use super::reader::SSTableReader;
use super::{HEADER_SIZE, TOMBSTONE_MARKER};

/// Iterator over SSTable entries in sorted key order
pub struct SSTableIterator<'a> {
    reader: &'a mut SSTableReader,
    /// Current position in file
    current_offset: u64,
    hasher: crc32fast::Hasher,
    done: bool,
}

impl<'a> SSTableIterator<'a> {
    /// Create a new iterator starting from the data block
    pub(super) fn new(reader: &'a mut SSTableReader) -> Result<Self> {
        reader.file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            reader,
            current_offset: HEADER_SIZE,
            hasher: crc32fast::Hasher::new(),
            done: false,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, MemTableEntry)> {
        let mut header = [0u8; 8];
        self.reader.file.read_exact(&mut header)?;
        self.hasher.update(&header);

        let mut fields = &header[..];
        let key_len = fields.get_u32_le() as usize;
        let val_len = fields.get_u32_le();

        let mut key = vec![0u8; key_len];
        self.reader.file.read_exact(&mut key)?;
        self.hasher.update(&key);
        self.current_offset += 8 + key_len as u64;

        let entry = if val_len == TOMBSTONE_MARKER {
            MemTableEntry::Tombstone
        } else {
            let mut stored = vec![0u8; val_len as usize];
            self.reader.file.read_exact(&mut stored)?;
            self.hasher.update(&stored);
            self.current_offset += val_len as u64;
            MemTableEntry::Value(compression::decompress(
                &stored,
                self.reader.compression(),
            )?)
        };

        Ok((key, entry))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    type Item = Result<(Vec<u8>, MemTableEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Stop at index block, checking what we read
        if self.current_offset >= self.reader.index_offset {
            self.done = true;
            let actual = self.hasher.clone().finalize();
            if actual != self.reader.data_crc {
                return Some(Err(HostKvError::Corruption(format!(
                    "SSTable {} data checksum mismatch",
                    self.reader.path()
                ))));
            }
            return None;
        }

        let result = self.read_entry();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

//! SSTable Module
//!
//! Sorted String Table - immutable sorted key-value storage, written and read
//! entirely through the environment.
//!
//! ## File Format
//! All integers little-endian.
//! ```text
//! header   "HKVT" | version u16 | compression u8 | entry count u64
//! data     per entry: key len u32 | value len u32 | key | stored value
//!          value len u32::MAX marks a tombstone and carries no value bytes;
//!          stored values are compressed with the header's codec
//! index    per entry: key len u32 | data offset u64 | key
//! bloom    serialized filter, zero bytes when filters are off
//! footer   index offset u64 | bloom offset u64 | data crc32 u32 | 4 zero bytes
//! ```

mod builder;
mod iterator;
mod reader;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

use super::CompressionType;

/// Magic bytes identifying a hostkv table file
pub(crate) const MAGIC: &[u8; 4] = b"HKVT";

/// Table format version
pub(crate) const VERSION: u16 = 1;

/// Magic (4) + Version (2) + Compression (1) + EntryCount (8)
pub(crate) const HEADER_SIZE: u64 = 15;

/// Offset of the entry count inside the header
pub(crate) const COUNT_OFFSET: u64 = 7;

/// IndexOffset (8) + BloomOffset (8) + DataCRC (4) + Padding (4)
pub(crate) const FOOTER_SIZE: u64 = 24;

/// Value length recorded for a tombstone
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Knobs that shape a new table
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    pub compression: CompressionType,
    /// `None` writes no bloom block
    pub bloom_bits_per_key: Option<usize>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            compression: CompressionType::None,
            bloom_bits_per_key: None,
        }
    }
}

/// Summary of a table returned by [`SSTableBuilder::finish`]
#[derive(Debug, Clone)]
pub struct SSTable {
    pub path: String,
    pub entry_count: u64,
    /// First key written (empty for an empty table)
    pub min_key: Vec<u8>,
    /// Last key written
    pub max_key: Vec<u8>,
    pub file_size: u64,
}

impl SSTable {
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// False when `key` falls outside the table's key range
    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.entry_count > 0 && (self.min_key.as_slice()..=self.max_key.as_slice()).contains(&key)
    }
}

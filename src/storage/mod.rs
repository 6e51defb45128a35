//! Storage Module
//!
//! Persistent storage layer: sorted immutable tables plus the manifest that
//! says which of them are live.
//!
//! ## Responsibilities
//! - Persist data in sorted format through the environment
//! - Point lookups with range and bloom filter checks
//! - Ordered neighbour lookups for cursors
//! - Full compaction when too many tables pile up
//!
//! ## Directory Layout
//! ```text
//! {db}/
//!   ├── MANIFEST              live table ids (replaced via MANIFEST.tmp)
//!   ├── sstable_000001.sst
//!   └── sstable_000002.sst
//! ```

mod bloom;
mod cache;
mod compression;
mod manager;
mod manifest;
mod sstable;

pub use bloom::BloomFilter;
pub use cache::{BlockCache, CacheStats};
pub use compression::{compress, decompress, CompressionType};
pub use manager::StorageManager;
pub use manifest::{Manifest, MANIFEST_FILENAME};
pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader, TableOptions};

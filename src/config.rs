//! Configuration for hostkv
//!
//! Engine options with sensible defaults, plus the fixed set the key-value
//! store opens its databases with.

use crate::storage::CompressionType;

/// Where the engine's informational log goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoLog {
    /// Drop every line
    Discard,

    /// Append to `{db}/LOG`, rotating the previous one to `LOG.old`
    File,
}

/// Options for opening a database
#[derive(Debug, Clone)]
pub struct Options {
    // -------------------------------------------------------------------------
    // Open Behaviour
    // -------------------------------------------------------------------------
    /// Create the database if it does not exist
    pub create_if_missing: bool,

    /// Fail if the database already exists
    pub error_if_exists: bool,

    // -------------------------------------------------------------------------
    // Table Configuration
    // -------------------------------------------------------------------------
    /// Bloom filter bits per key; `None` disables filters
    pub bloom_bits_per_key: Option<usize>,

    /// Block cache capacity in bytes (0 disables the cache)
    pub block_cache_capacity: usize,

    /// Value compression for new tables
    pub compression: CompressionType,

    /// Table count above which everything is compacted into one table
    pub max_sstables: usize,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Memtable size (bytes) that triggers a flush
    pub write_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------
    pub info_log: InfoLog,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            bloom_bits_per_key: None,
            block_cache_capacity: 8 * 1024 * 1024, // 8 MB
            compression: CompressionType::None,
            max_sstables: 4,
            write_buffer_size: 4 * 1024 * 1024, // 4 MB
            info_log: InfoLog::File,
        }
    }
}

impl Options {
    /// Create a new options builder
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// The options every [`KvStore`](crate::KvStore) database is opened with
    pub fn for_store() -> Self {
        Self::builder()
            .create_if_missing(true)
            .bloom_bits_per_key(10)
            .block_cache_capacity(40 * 1024 * 1024) // 40 MB
            .write_buffer_size(4 * 1024 * 1024) // 4 MB
            .info_log(InfoLog::Discard)
            .compression(CompressionType::Zlib)
            .build()
    }
}

/// Builder for Options
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.options.create_if_missing = value;
        self
    }

    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.options.error_if_exists = value;
        self
    }

    /// Enable bloom filters with this many bits per key
    pub fn bloom_bits_per_key(mut self, bits: usize) -> Self {
        self.options.bloom_bits_per_key = Some(bits);
        self
    }

    /// Set the block cache capacity (in bytes)
    pub fn block_cache_capacity(mut self, bytes: usize) -> Self {
        self.options.block_cache_capacity = bytes;
        self
    }

    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.options.compression = compression;
        self
    }

    /// Set the table count that triggers compaction
    pub fn max_sstables(mut self, count: usize) -> Self {
        self.options.max_sstables = count;
        self
    }

    /// Set the memtable flush threshold (in bytes)
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.options.write_buffer_size = bytes;
        self
    }

    pub fn info_log(mut self, info_log: InfoLog) -> Self {
        self.options.info_log = info_log;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

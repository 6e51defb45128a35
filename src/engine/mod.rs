//! Engine Module
//!
//! The embedded storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Trigger flushes when the MemTable is full, compaction when tables pile up
//! - Manage crash recovery on startup
//! - Serve ordered, bidirectional cursors ([`DbIterator`])
//!
//! Every byte the engine reads or writes goes through the [`Env`] it was
//! opened with.

mod iterator;
mod log;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::Options;
use crate::env::{self, Env};
use crate::error::{HostKvError, Result};
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::{
    BlockCache, CacheStats, StorageManager, TableOptions, MANIFEST_FILENAME,
};
use crate::wal::{Operation, WalRecovery, WalWriter};

pub use iterator::DbIterator;
pub use log::{InfoLogger, LOG_FILENAME, OLD_LOG_FILENAME};

/// WAL file name inside the database directory
pub const WAL_FILENAME: &str = "wal.log";

/// An open database
///
/// ## Concurrency Model
/// - Writes (put/delete/flush/compact) are serialized by `write_lock`
///   and must acquire: write_lock → WAL → memtable → storage
/// - Reads go to the MemTable (internal RwLock) and then to storage
pub struct Db {
    env: Arc<dyn Env>,

    /// Database directory
    path: String,

    options: Options,

    /// Write-ahead log for durability
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent tables (internal RwLock)
    storage: StorageManager,

    cache: Arc<BlockCache>,

    info_log: InfoLogger,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl Db {
    /// Open or create the database at `path`
    ///
    /// On startup:
    /// 1. Check create_if_missing / error_if_exists, create the directory
    /// 2. Start the info log (previous one becomes LOG.old)
    /// 3. Load the live tables
    /// 4. Recover the WAL, replay it and flush what it held
    /// 5. Start a fresh WAL
    pub fn open(env: Arc<dyn Env>, path: &str, options: Options) -> Result<Self> {
        let wal_path = env::join(path, WAL_FILENAME);
        let exists =
            env.exists(&env::join(path, MANIFEST_FILENAME)) || env.exists(&wal_path);

        if exists && options.error_if_exists {
            return Err(HostKvError::InvalidArgument(format!(
                "{}: exists (error_if_exists is true)",
                path
            )));
        }
        if !exists && !options.create_if_missing {
            return Err(HostKvError::InvalidArgument(format!(
                "{}: does not exist (create_if_missing is false)",
                path
            )));
        }

        env.create_dir(path)?;

        let info_log = InfoLogger::open(Arc::clone(&env), path, options.info_log)?;
        info_log.log(format_args!("Opening database {}", path));

        let cache = Arc::new(BlockCache::new(options.block_cache_capacity));
        let table_options = TableOptions {
            compression: options.compression,
            bloom_bits_per_key: options.bloom_bits_per_key,
        };
        let storage = StorageManager::open(
            Arc::clone(&env),
            path,
            table_options,
            Arc::clone(&cache),
        )?;

        let memtable = MemTable::new();
        let mut last_lsn = storage.last_lsn();

        if env.exists(&wal_path) {
            let (entries, result) = WalRecovery::recover(Arc::clone(&env), &wal_path)?;
            info_log.log(format_args!(
                "Recovered {} WAL entries ({} corrupted, truncated: {})",
                result.entries_recovered, result.entries_corrupted, result.was_truncated
            ));

            // Entries at or below the persisted LSN are already in tables
            let persisted = storage.last_lsn();
            for entry in entries.into_iter().filter(|e| e.lsn > persisted) {
                last_lsn = last_lsn.max(entry.lsn);
                match entry.operation {
                    Operation::Put { key, value } => {
                        memtable.put(key, value);
                    }
                    Operation::Delete { key } => {
                        memtable.delete(key);
                    }
                }
            }

            // Make recovered data durable in a table before the WAL is reset
            if !memtable.is_empty() {
                debug!(entries = memtable.entry_count(), "flushing recovered entries");
                storage.flush(&memtable, last_lsn)?;
                memtable.clear();
            }
        }

        let wal = WalWriter::open(Arc::clone(&env), &wal_path, last_lsn + 1)?;

        let db = Self {
            env,
            path: path.to_string(),
            options,
            wal: Mutex::new(wal),
            memtable,
            storage,
            cache,
            info_log,
            write_lock: Mutex::new(()),
        };
        db.maybe_compact()?;

        info!(path = %db.path, tables = db.storage.sstable_count(), "database opened");
        Ok(db)
    }

    /// Delete the database at `path` and its directory
    ///
    /// Only files the engine owns are removed; the directory is left in place
    /// if anything else is in it. A missing directory is not an error.
    pub fn destroy(env: Arc<dyn Env>, path: &str) -> Result<()> {
        let children = match env.list_children(path) {
            Ok(children) => children,
            Err(HostKvError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut foreign = false;
        for name in &children {
            let owned = name == WAL_FILENAME
                || name == LOG_FILENAME
                || name == OLD_LOG_FILENAME
                || name.ends_with(".tmp")
                || StorageManager::is_storage_file(name);
            if owned {
                env.delete_file(&env::join(path, name))?;
            } else {
                foreign = true;
            }
        }

        if !foreign {
            env.delete_dir(path)?;
        }
        info!(path, "database destroyed");
        Ok(())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.into_value());
        }
        Ok(self.storage.get(key)?.and_then(MemTableEntry::into_value))
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Delete a key (absent keys are fine)
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.write(Operation::Delete { key: key.to_vec() })
    }

    /// WAL first, then memtable, then flush if the memtable is full
    fn write(&self, operation: Operation) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(operation.clone())?;

        let new_size = match operation {
            Operation::Put { key, value } => self.memtable.put(key, value),
            Operation::Delete { key } => self.memtable.delete(key),
        };

        if new_size >= self.options.write_buffer_size {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Flush memtable to a table regardless of its size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let mut wal = self.wal.lock();
        let last_lsn = wal.current_lsn() - 1;

        let table = self.storage.flush(&self.memtable, last_lsn)?;
        self.memtable.clear();

        // Entries are now durable in a table
        wal.truncate()?;
        drop(wal);

        self.info_log.log(format_args!(
            "Flushed {} entries to {} ({} bytes)",
            table.entry_count, table.path, table.file_size
        ));

        self.maybe_compact()
    }

    /// Merge all tables into one
    pub fn compact(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.compact_internal()
    }

    fn maybe_compact(&self) -> Result<()> {
        if self.storage.sstable_count() > self.options.max_sstables {
            self.compact_internal()?;
        }
        Ok(())
    }

    fn compact_internal(&self) -> Result<()> {
        let before = self.storage.sstable_count();
        self.storage.compact()?;
        self.info_log.log(format_args!(
            "Compacted {} tables into {}",
            before,
            self.storage.sstable_count()
        ));
        Ok(())
    }

    /// A cursor over this database, positioned nowhere (not valid)
    pub fn iter(&self) -> DbIterator {
        DbIterator::new()
    }

    /// Close the database, flushing the memtable first
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.info_log.log(format_args!("Closing database {}", self.path));
        debug!(path = %self.path, "database closed");
        self.wal.into_inner().close()
    }

    // =========================================================================
    // Ordered neighbours (memtable merged over storage, newest wins)
    // =========================================================================

    pub(crate) fn entry_after(&self, key: Option<&[u8]>) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let mem = self.memtable.next_after(key);
        let disk = self.storage.next_after(key)?;
        Ok(pick(mem, disk, |m, d| m <= d))
    }

    pub(crate) fn entry_at_or_after(&self, key: &[u8]) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let mem = self.memtable.at_or_after(key);
        let disk = self.storage.at_or_after(key)?;
        Ok(pick(mem, disk, |m, d| m <= d))
    }

    pub(crate) fn entry_before(&self, key: Option<&[u8]>) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let mem = self.memtable.prev_before(key);
        let disk = self.storage.prev_before(key)?;
        Ok(pick(mem, disk, |m, d| m >= d))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn env(&self) -> &Arc<dyn Env> {
        &self.env
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Choose between a memtable and a storage candidate.
/// `prefer_mem(m, d)` says whether the memtable key comes first; on equal
/// keys the memtable holds the newer version.
fn pick<F>(
    mem: Option<(Vec<u8>, MemTableEntry)>,
    disk: Option<(Vec<u8>, MemTableEntry)>,
    prefer_mem: F,
) -> Option<(Vec<u8>, MemTableEntry)>
where
    F: Fn(&[u8], &[u8]) -> bool,
{
    match (mem, disk) {
        (Some(m), Some(d)) => {
            if prefer_mem(&m.0, &d.0) {
                Some(m)
            } else {
                Some(d)
            }
        }
        (m, None) => m,
        (None, d) => d,
    }
}

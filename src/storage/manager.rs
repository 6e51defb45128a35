//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Load the live table set from the manifest (or discover it on first open)
//! - Remove table files the manifest does not know about
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Merge every table into one during compaction

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::env::{self, Env};
use crate::error::{HostKvError, Result};
use crate::memtable::{MemTable, MemTableEntry};

use super::cache::BlockCache;
use super::manifest::{Manifest, MANIFEST_FILENAME};
use super::sstable::TableOptions;
use super::{SSTable, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock; lookups take the write side because
///   readers move their file position
/// - `next_sstable_id`: Atomic counter
pub struct StorageManager {
    env: Arc<dyn Env>,

    /// Directory where SSTables are stored
    dir: String,

    options: TableOptions,

    cache: Arc<BlockCache>,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables
    next_sstable_id: AtomicU64,

    /// Highest LSN persisted in tables
    last_lsn: AtomicU64,
}

impl StorageManager {
    /// Open storage in `dir` (which must exist)
    ///
    /// On startup:
    /// 1. Load the manifest, or discover tables by listing the directory
    /// 2. Open readers for each live table (loads indexes into RAM)
    /// 3. Delete table files that are not live
    pub fn open(
        env: Arc<dyn Env>,
        dir: &str,
        options: TableOptions,
        cache: Arc<BlockCache>,
    ) -> Result<Self> {
        let children = env.list_children(dir)?;

        let manifest = match Manifest::load(&env, dir)? {
            Some(manifest) => manifest,
            None => {
                // First open, or a directory from before manifests existed
                let mut ids: Vec<u64> = children
                    .iter()
                    .filter_map(|name| Self::parse_sstable_id(name))
                    .collect();
                ids.sort_unstable_by(|a, b| b.cmp(a));
                let manifest = Manifest {
                    next_table_id: ids.first().map(|&id| id + 1).unwrap_or(1),
                    tables: ids,
                    last_lsn: 0,
                };
                manifest.store(&env, dir)?;
                manifest
            }
        };

        let mut sstables = Vec::with_capacity(manifest.tables.len());
        for &id in &manifest.tables {
            let path = Self::sstable_path_with_dir(dir, id);
            let reader = SSTableReader::open(Arc::clone(&env), &path, id, Arc::clone(&cache))?;
            sstables.push(reader);
        }

        let live: HashSet<u64> = manifest.tables.iter().copied().collect();
        for name in &children {
            let orphan = match Self::parse_sstable_id(name) {
                Some(id) => !live.contains(&id),
                None => name.ends_with(".tmp"),
            };
            if orphan {
                warn!(file = %name, "removing file not referenced by the manifest");
                env.delete_file(&env::join(dir, name))?;
            }
        }

        debug!(
            dir,
            tables = sstables.len(),
            next_id = manifest.next_table_id,
            "storage opened"
        );

        Ok(Self {
            env,
            dir: dir.to_string(),
            options,
            cache,
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(manifest.next_table_id.max(1)),
            last_lsn: AtomicU64::new(manifest.last_lsn),
        })
    }

    /// Get the entry for a key (searches all SSTables newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(Value))` — newest version is a value
    /// - `Ok(Some(Tombstone))` — newest version is a deletion
    /// - `Ok(None)` — no table knows the key
    pub fn get(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            // Skip SSTable if the range check or bloom filter rules it out
            if !reader.might_contain(key) {
                continue;
            }
            if let Some(entry) = reader.get(key)? {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// `last_lsn` is the newest WAL record the memtable contains.
    pub fn flush(&self, memtable: &MemTable, last_lsn: u64) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(HostKvError::InvalidArgument(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(Arc::clone(&self.env), &path, self.options)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        let metadata = builder.finish()?;

        let reader = SSTableReader::open(Arc::clone(&self.env), &path, id, Arc::clone(&self.cache))?;

        let mut sstables = self.sstables.write();
        sstables.insert(0, reader);
        self.last_lsn.fetch_max(last_lsn, Ordering::SeqCst);
        self.store_manifest(&sstables)?;

        debug!(id, entries = metadata.entry_count, "memtable flushed");
        Ok(metadata)
    }

    /// Merge every table into one, dropping tombstones and shadowed values
    ///
    /// The new table becomes live (manifest swap) before the inputs are
    /// deleted, so a crash in between only leaves orphans behind.
    pub fn compact(&self) -> Result<()> {
        let mut sstables = self.sstables.write();
        if sstables.len() < 2 {
            return Ok(());
        }

        // Oldest first so newer versions overwrite older ones
        let mut merged: BTreeMap<Vec<u8>, MemTableEntry> = BTreeMap::new();
        for reader in sstables.iter_mut().rev() {
            for item in reader.iter()? {
                let (key, entry) = item?;
                merged.insert(key, entry);
            }
        }

        let mut output = Vec::new();
        let live: Vec<(Vec<u8>, Vec<u8>)> = merged
            .into_iter()
            .filter_map(|(k, e)| e.into_value().map(|v| (k, v)))
            .collect();

        if !live.is_empty() {
            let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
            let path = self.sstable_path(id);
            let mut builder = SSTableBuilder::new(Arc::clone(&self.env), &path, self.options)?;
            for (key, value) in &live {
                builder.add(key, value)?;
            }
            builder.finish()?;
            output.push(SSTableReader::open(
                Arc::clone(&self.env),
                &path,
                id,
                Arc::clone(&self.cache),
            )?);
        }

        let inputs = std::mem::replace(&mut *sstables, output);
        self.store_manifest(&sstables)?;

        for reader in &inputs {
            self.cache.evict_table(reader.id());
        }
        let input_count = inputs.len();
        let paths: Vec<String> = inputs.iter().map(|r| r.path().to_string()).collect();
        drop(inputs);
        for path in paths {
            if let Err(e) = self.env.delete_file(&path) {
                warn!(path = %path, error = %e, "could not delete compacted table");
            }
        }

        info!(inputs = input_count, keys = live.len(), "compaction finished");
        Ok(())
    }

    // =========================================================================
    // Ordered neighbours across all tables (newest version of each key)
    // =========================================================================

    /// Smallest key strictly after `key` in any table
    pub fn next_after(&self, key: Option<&[u8]>) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let mut sstables = self.sstables.write();
        let mut best: Option<(Vec<u8>, MemTableEntry)> = None;
        for reader in sstables.iter_mut() {
            if let Some(candidate) = reader.next_after(key)? {
                // Strictly smaller only: on ties the newer table already won
                if best.as_ref().map_or(true, |(k, _)| candidate.0 < *k) {
                    best = Some(candidate);
                }
            }
        }
        Ok(best)
    }

    /// Smallest key at or after `key` in any table
    pub fn at_or_after(&self, key: &[u8]) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let mut sstables = self.sstables.write();
        let mut best: Option<(Vec<u8>, MemTableEntry)> = None;
        for reader in sstables.iter_mut() {
            if let Some(candidate) = reader.at_or_after(key)? {
                if best.as_ref().map_or(true, |(k, _)| candidate.0 < *k) {
                    best = Some(candidate);
                }
            }
        }
        Ok(best)
    }

    /// Largest key strictly before `key` in any table
    pub fn prev_before(&self, key: Option<&[u8]>) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let mut sstables = self.sstables.write();
        let mut best: Option<(Vec<u8>, MemTableEntry)> = None;
        for reader in sstables.iter_mut() {
            if let Some(candidate) = reader.prev_before(key)? {
                if best.as_ref().map_or(true, |(k, _)| candidate.0 > *k) {
                    best = Some(candidate);
                }
            }
        }
        Ok(best)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Live table ids, newest first
    pub fn table_ids(&self) -> Vec<u64> {
        self.sstables.read().iter().map(|r| r.id()).collect()
    }

    /// Get the data directory path
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    /// Highest LSN already persisted in tables
    pub fn last_lsn(&self) -> u64 {
        self.last_lsn.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn store_manifest(&self, sstables: &[SSTableReader]) -> Result<()> {
        Manifest {
            tables: sstables.iter().map(|r| r.id()).collect(),
            next_table_id: self.next_sstable_id.load(Ordering::SeqCst),
            last_lsn: self.last_lsn.load(Ordering::SeqCst),
        }
        .store(&self.env, &self.dir)
    }

    /// Generate the file path for an SSTable with given ID
    fn sstable_path(&self, id: u64) -> String {
        Self::sstable_path_with_dir(&self.dir, id)
    }

    /// Generate SSTable path given a directory and ID
    pub fn sstable_path_with_dir(dir: &str, id: u64) -> String {
        env::join(dir, &format!("sstable_{:06}.sst", id))
    }

    /// Parse SSTable ID from a file name
    /// "sstable_000042.sst" → Some(42)
    pub fn parse_sstable_id(name: &str) -> Option<u64> {
        name.strip_prefix("sstable_")?
            .strip_suffix(".sst")?
            .parse()
            .ok()
    }

    /// True for files this manager owns
    pub fn is_storage_file(name: &str) -> bool {
        name == MANIFEST_FILENAME || Self::parse_sstable_id(name).is_some()
    }
}

//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::MemTableEntry;

#[derive(Default)]
struct Inner {
    data: BTreeMap<Vec<u8>, MemTableEntry>,
    /// Sum of key and value lengths (tombstones count their key only)
    size: usize,
}

/// In-memory table for recent writes
pub struct MemTable {
    inner: RwLock<Inner>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Get the entry for a key (read lock)
    ///
    /// `Some(Tombstone)` means the key was deleted here and older tables must
    /// not be consulted.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.inner.read().data.get(key).cloned()
    }

    /// Put a key-value pair (write lock). Returns the new size.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let added = key.len() + value.len();
        self.insert(key, MemTableEntry::Value(value), added)
    }

    /// Delete a key by inserting a tombstone (write lock). Returns the new size.
    pub fn delete(&self, key: Vec<u8>) -> usize {
        let added = key.len();
        self.insert(key, MemTableEntry::Tombstone, added)
    }

    fn insert(&self, key: Vec<u8>, entry: MemTableEntry, added: usize) -> usize {
        let mut inner = self.inner.write();
        let key_len = key.len();
        if let Some(old) = inner.data.insert(key, entry) {
            let removed = key_len
                + match old {
                    MemTableEntry::Value(v) => v.len(),
                    MemTableEntry::Tombstone => 0,
                };
            inner.size -= removed;
        }
        inner.size += added;
        inner.size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> Vec<(Vec<u8>, MemTableEntry)> {
        self.inner
            .read()
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Smallest entry with key strictly greater than `key` (`None` = from the start)
    pub fn next_after(&self, key: Option<&[u8]>) -> Option<(Vec<u8>, MemTableEntry)> {
        let inner = self.inner.read();
        let lower = match key {
            Some(k) => Bound::Excluded(k),
            None => Bound::Unbounded,
        };
        inner
            .data
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Smallest entry with key greater than or equal to `key`
    pub fn at_or_after(&self, key: &[u8]) -> Option<(Vec<u8>, MemTableEntry)> {
        let inner = self.inner.read();
        inner
            .data
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Largest entry with key strictly less than `key` (`None` = from the end)
    pub fn prev_before(&self, key: Option<&[u8]>) -> Option<(Vec<u8>, MemTableEntry)> {
        let inner = self.inner.read();
        let upper = match key {
            Some(k) => Bound::Excluded(k),
            None => Bound::Unbounded,
        };
        inner
            .data
            .range::<[u8], _>((Bound::Unbounded, upper))
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.data.clear();
        inner.size = 0;
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

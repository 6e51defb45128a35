//! Block cache
//!
//! LRU of decoded values keyed by (table id, entry offset), bounded by the
//! total number of cached value bytes.

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;

type CacheKey = (u64, u64);

struct Inner {
    entries: LruCache<CacheKey, Bytes>,
    used: usize,
    hits: u64,
    misses: u64,
}

/// Shared value cache for all tables of one database
pub struct BlockCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

impl BlockCache {
    /// A capacity of 0 disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                used: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn get(&self, table_id: u64, offset: u64) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        let found = inner.entries.get(&(table_id, offset)).cloned();
        match found {
            Some(value) => {
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, table_id: u64, offset: u64, value: Bytes) {
        // Values larger than the whole cache are never kept
        if value.len() > self.capacity {
            return;
        }

        let mut inner = self.inner.lock();
        let added = value.len();
        let replaced = inner.entries.put((table_id, offset), value);
        if let Some(old) = replaced {
            inner.used -= old.len();
        }
        inner.used += added;

        while inner.used > self.capacity {
            let evicted = inner.entries.pop_lru();
            match evicted {
                Some((_, value)) => inner.used -= value.len(),
                None => break,
            }
        }
    }

    /// Drop everything cached for a table that no longer exists
    pub fn evict_table(&self, table_id: u64) {
        let mut inner = self.inner.lock();
        let keys: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|((id, _), _)| *id == table_id)
            .map(|(key, _)| *key)
            .collect();
        for key in keys {
            let removed = inner.entries.pop(&key);
            if let Some(value) = removed {
                inner.used -= value.len();
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            bytes: inner.used,
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

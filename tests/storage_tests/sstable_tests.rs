//! Tests for SSTable implementation
//!
//! These tests verify:
//! - SSTable creation and writing through the environment
//! - O(log n) key lookups via in-memory index
//! - Tombstone handling
//! - Iterator over all entries (with checksum verification)
//! - Bloom filter and min/max key range filtering
//! - Compression and the block cache
//! - File format validation

use std::sync::Arc;

use hostkv::env::{AccessFlags, Env, HostEnv};
use hostkv::error::HostKvError;
use hostkv::host::MemoryHost;
use hostkv::memtable::MemTableEntry;
use hostkv::storage::{
    BlockCache, CompressionType, SSTable, SSTableBuilder, SSTableReader, TableOptions,
};

// =============================================================================
// Helper Functions
// =============================================================================

const PATH: &str = "/test.sst";

fn setup() -> (MemoryHost, Arc<dyn Env>) {
    let host = MemoryHost::new();
    let env: Arc<dyn Env> = Arc::new(HostEnv::new(Arc::new(host.clone())).unwrap());
    (host, env)
}

fn cache() -> Arc<BlockCache> {
    Arc::new(BlockCache::new(1024 * 1024))
}

/// Create an SSTable with numbered entries
fn create_sstable_with_entries(env: &Arc<dyn Env>, count: usize, options: TableOptions) -> SSTable {
    let mut builder = SSTableBuilder::new(Arc::clone(env), PATH, options).unwrap();
    for i in 0..count {
        let key = format!("key{:05}", i); // Zero-padded for lexicographic order
        let value = format!("value{}", i);
        builder.add(key.as_bytes(), value.as_bytes()).unwrap();
    }
    builder.finish().unwrap()
}

fn open_reader(env: &Arc<dyn Env>) -> SSTableReader {
    SSTableReader::open(Arc::clone(env), PATH, 1, cache()).unwrap()
}

// =============================================================================
// SSTableBuilder Tests
// =============================================================================

#[test]
fn test_builder_creates_file() {
    let (host, env) = setup();
    let sstable = create_sstable_with_entries(&env, 5, TableOptions::default());

    assert!(env.exists(PATH));
    assert_eq!(sstable.entry_count(), 5);
    assert_eq!(sstable.path, PATH);
    assert_eq!(sstable.file_size, host.contents(PATH).unwrap().len() as u64);
    assert_eq!(host.open_file_count(), 0);
}

#[test]
fn test_builder_empty_sstable() {
    let (_host, env) = setup();
    let sstable = SSTableBuilder::new(Arc::clone(&env), PATH, TableOptions::default())
        .unwrap()
        .finish()
        .unwrap();

    assert_eq!(sstable.entry_count(), 0);
    assert!(!sstable.might_contain(b"anything"));

    let mut reader = open_reader(&env);
    assert_eq!(reader.entry_count(), 0);
    assert!(reader.min_key().is_none());
    assert!(reader.get(b"anything").unwrap().is_none());
}

#[test]
fn test_builder_tracks_min_max_keys() {
    let (_host, env) = setup();
    let sstable = create_sstable_with_entries(&env, 10, TableOptions::default());

    assert_eq!(sstable.min_key, b"key00000");
    assert_eq!(sstable.max_key, b"key00009");
    assert!(sstable.might_contain(b"key00005"));
    assert!(!sstable.might_contain(b"key00010"));
    assert!(!sstable.might_contain(b"a"));
}

#[test]
fn test_builder_rejects_unsorted_keys() {
    let (_host, env) = setup();
    let mut builder = SSTableBuilder::new(Arc::clone(&env), PATH, TableOptions::default()).unwrap();
    builder.add(b"b", b"1").unwrap();

    assert!(matches!(
        builder.add(b"a", b"2"),
        Err(HostKvError::InvalidArgument(_))
    ));
    assert!(builder.add(b"b", b"3").is_err());
}

// =============================================================================
// SSTableReader Tests
// =============================================================================

#[test]
fn test_reader_get_existing_keys() {
    let (_host, env) = setup();
    create_sstable_with_entries(&env, 100, TableOptions::default());
    let mut reader = open_reader(&env);

    for i in [0, 1, 50, 99] {
        let key = format!("key{:05}", i);
        assert_eq!(
            reader.get(key.as_bytes()).unwrap(),
            Some(MemTableEntry::Value(format!("value{}", i).into_bytes()))
        );
    }
    assert!(reader.get(b"key00100").unwrap().is_none());
    assert!(reader.get(b"zzz").unwrap().is_none());
}

#[test]
fn test_reader_tombstones() {
    let (_host, env) = setup();
    let mut builder = SSTableBuilder::new(Arc::clone(&env), PATH, TableOptions::default()).unwrap();
    builder.add(b"alive", b"yes").unwrap();
    builder.add_tombstone(b"dead").unwrap();
    builder.finish().unwrap();

    let mut reader = open_reader(&env);
    assert_eq!(
        reader.get(b"alive").unwrap(),
        Some(MemTableEntry::Value(b"yes".to_vec()))
    );
    assert_eq!(reader.get(b"dead").unwrap(), Some(MemTableEntry::Tombstone));
}

#[test]
fn test_reader_empty_key_and_value() {
    let (_host, env) = setup();
    let mut builder = SSTableBuilder::new(Arc::clone(&env), PATH, TableOptions::default()).unwrap();
    builder.add(b"", b"empty key").unwrap();
    builder.add(b"k", b"").unwrap();
    builder.finish().unwrap();

    let mut reader = open_reader(&env);
    assert_eq!(
        reader.get(b"").unwrap(),
        Some(MemTableEntry::Value(b"empty key".to_vec()))
    );
    assert_eq!(reader.get(b"k").unwrap(), Some(MemTableEntry::Value(vec![])));
}

#[test]
fn test_reader_neighbours() {
    let (_host, env) = setup();
    create_sstable_with_entries(&env, 5, TableOptions::default());
    let mut reader = open_reader(&env);

    let first = reader.next_after(None).unwrap().unwrap();
    assert_eq!(first.0, b"key00000");

    let after = reader.next_after(Some(b"key00002")).unwrap().unwrap();
    assert_eq!(after.0, b"key00003");
    assert_eq!(after.1, MemTableEntry::Value(b"value3".to_vec()));

    assert_eq!(reader.at_or_after(b"key00002").unwrap().unwrap().0, b"key00002");
    assert!(reader.next_after(Some(b"key00004")).unwrap().is_none());

    assert_eq!(reader.prev_before(None).unwrap().unwrap().0, b"key00004");
    assert_eq!(
        reader.prev_before(Some(b"key00002")).unwrap().unwrap().0,
        b"key00001"
    );
    assert!(reader.prev_before(Some(b"key00000")).unwrap().is_none());
}

// =============================================================================
// Iterator Tests
// =============================================================================

#[test]
fn test_iterator_returns_all_in_order() {
    let (_host, env) = setup();
    create_sstable_with_entries(&env, 50, TableOptions::default());
    let mut reader = open_reader(&env);

    let entries: Vec<_> = reader.iter().unwrap().map(|e| e.unwrap()).collect();
    assert_eq!(entries.len(), 50);
    for window in entries.windows(2) {
        assert!(window[0].0 < window[1].0);
    }
    assert_eq!(entries[7].1, MemTableEntry::Value(b"value7".to_vec()));
}

#[test]
fn test_iterator_detects_data_corruption() {
    let (host, env) = setup();
    create_sstable_with_entries(&env, 3, TableOptions::default());

    // Flip a byte inside the first value
    let mut bytes = host.contents(PATH).unwrap();
    let value_pos = 15 + 8 + b"key00000".len();
    bytes[value_pos] ^= 0x20;
    let handle = env
        .open_file(PATH, AccessFlags::WRITE | AccessFlags::TRUNCATE)
        .unwrap();
    env.write(handle, &bytes).unwrap();
    env.close_file(handle).unwrap();

    let mut reader = open_reader(&env);
    let results: Vec<_> = reader.iter().unwrap().collect();
    assert!(matches!(
        results.last(),
        Some(Err(HostKvError::Corruption(_)))
    ));
}

// =============================================================================
// Bloom Filter / Compression / Cache
// =============================================================================

#[test]
fn test_bloom_filter_has_no_false_negatives() {
    let (_host, env) = setup();
    let options = TableOptions {
        compression: CompressionType::None,
        bloom_bits_per_key: Some(10),
    };
    create_sstable_with_entries(&env, 500, options);
    let reader = open_reader(&env);

    for i in 0..500 {
        assert!(reader.might_contain(format!("key{:05}", i).as_bytes()));
    }

    let false_positives = (0..1000)
        .filter(|i| reader.might_contain(format!("key{:05}x", i).as_bytes()))
        .count();
    assert!(false_positives < 100, "too many false positives: {}", false_positives);
}

#[test]
fn test_compressed_tables() {
    for compression in [CompressionType::Snappy, CompressionType::Zlib] {
        let (_host, env) = setup();
        let options = TableOptions {
            compression,
            bloom_bits_per_key: None,
        };
        let value = vec![b'z'; 4096];
        let mut builder = SSTableBuilder::new(Arc::clone(&env), PATH, options).unwrap();
        builder.add(b"big", &value).unwrap();
        builder.add(b"empty", b"").unwrap();
        let sstable = builder.finish().unwrap();

        // Highly repetitive value shrinks on disk
        assert!(sstable.file_size < 1024, "{:?}", compression);

        let mut reader = open_reader(&env);
        assert_eq!(reader.compression(), compression);
        assert_eq!(reader.get(b"big").unwrap(), Some(MemTableEntry::Value(value)));
        assert_eq!(reader.get(b"empty").unwrap(), Some(MemTableEntry::Value(Vec::new())));
    }
}

#[test]
fn test_block_cache_serves_repeat_reads() {
    let (_host, env) = setup();
    create_sstable_with_entries(&env, 10, TableOptions::default());
    let cache = cache();
    let mut reader = SSTableReader::open(Arc::clone(&env), PATH, 7, Arc::clone(&cache)).unwrap();

    reader.get(b"key00003").unwrap();
    let misses = cache.stats().misses;
    reader.get(b"key00003").unwrap();

    let stats = cache.stats();
    assert_eq!(stats.misses, misses);
    assert!(stats.hits >= 1);
}

// =============================================================================
// Format Validation
// =============================================================================

#[test]
fn test_open_rejects_bad_magic() {
    let (_host, env) = setup();
    let handle = env
        .open_file(PATH, AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE)
        .unwrap();
    env.write(handle, &[0x42; 64]).unwrap();
    env.close_file(handle).unwrap();

    assert!(matches!(
        SSTableReader::open(env, PATH, 1, cache()),
        Err(HostKvError::Corruption(_))
    ));
}

#[test]
fn test_open_rejects_tiny_file() {
    let (_host, env) = setup();
    let handle = env
        .open_file(PATH, AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE)
        .unwrap();
    env.write(handle, b"HKVT").unwrap();
    env.close_file(handle).unwrap();

    assert!(matches!(
        SSTableReader::open(env, PATH, 1, cache()),
        Err(HostKvError::Corruption(_))
    ));
}

#[test]
fn test_open_missing_file() {
    let (_host, env) = setup();
    assert!(matches!(
        SSTableReader::open(env, "/missing.sst", 1, cache()),
        Err(HostKvError::NotFound(_))
    ));
}

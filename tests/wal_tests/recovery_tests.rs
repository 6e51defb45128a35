//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Clean recovery of every entry
//! - Partial tails are cut off the file
//! - Corrupted records are skipped and counted
//! - `verify` leaves the file untouched

use std::sync::Arc;

use hostkv::env::{AccessFlags, Env, HostEnv};
use hostkv::host::MemoryHost;
use hostkv::wal::{Operation, WalEntry, WalRecovery, WalWriter, HEADER_SIZE};

// =============================================================================
// Helper Functions
// =============================================================================

const WAL_PATH: &str = "/wal.log";

fn setup() -> (MemoryHost, Arc<dyn Env>) {
    let host = MemoryHost::new();
    let env: Arc<dyn Env> = Arc::new(HostEnv::new(Arc::new(host.clone())).unwrap());
    (host, env)
}

fn write_log(env: &Arc<dyn Env>, count: u64) {
    let mut writer = WalWriter::open(Arc::clone(env), WAL_PATH, 1).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("key{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
    }
    writer.close().unwrap();
}

fn append_raw(env: &Arc<dyn Env>, bytes: &[u8]) {
    let handle = env
        .open_file(WAL_PATH, AccessFlags::WRITE | AccessFlags::APPEND)
        .unwrap();
    env.write(handle, bytes).unwrap();
    env.close_file(handle).unwrap();
}

fn overwrite_raw(env: &Arc<dyn Env>, bytes: &[u8]) {
    let handle = env
        .open_file(WAL_PATH, AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE)
        .unwrap();
    env.write(handle, bytes).unwrap();
    env.close_file(handle).unwrap();
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_clean_log() {
    let (_host, env) = setup();
    write_log(&env, 10);

    let (entries, result) = WalRecovery::recover(Arc::clone(&env), WAL_PATH).unwrap();
    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);
    assert_eq!(result.valid_len, env.file_size(WAL_PATH).unwrap());

    let lsns: Vec<u64> = entries.iter().map(|e| e.lsn).collect();
    assert_eq!(lsns, (1..=10).collect::<Vec<_>>());
}

#[test]
fn test_recover_empty_log() {
    let (_host, env) = setup();
    write_log(&env, 0);

    let (entries, result) = WalRecovery::recover(env, WAL_PATH).unwrap();
    assert!(entries.is_empty());
    assert_eq!(result.last_lsn, 0);
    assert_eq!(result.valid_len, 0);
}

#[test]
fn test_partial_tail_is_cut() {
    let (host, env) = setup();
    write_log(&env, 5);
    let good_len = env.file_size(WAL_PATH).unwrap();

    let tail = WalEntry::new(6, Operation::Delete { key: b"x".to_vec() }, 0)
        .serialize()
        .unwrap();
    append_raw(&env, &tail[..tail.len() - 3]);

    let (entries, result) = WalRecovery::recover(Arc::clone(&env), WAL_PATH).unwrap();
    assert_eq!(entries.len(), 5);
    assert!(result.was_truncated);
    assert_eq!(result.valid_len, good_len);

    // The file now ends at the last whole record
    assert_eq!(host.contents(WAL_PATH).unwrap().len() as u64, good_len);
    let (_, again) = WalRecovery::recover(env, WAL_PATH).unwrap();
    assert!(!again.was_truncated);
    assert_eq!(again.entries_recovered, 5);
}

#[test]
fn test_log_of_only_a_partial_header() {
    let (host, env) = setup();
    overwrite_raw(&env, &[1, 2, 3]);

    let (entries, result) = WalRecovery::recover(env, WAL_PATH).unwrap();
    assert!(entries.is_empty());
    assert!(result.was_truncated);
    assert_eq!(result.valid_len, 0);
    assert!(host.contents(WAL_PATH).unwrap().is_empty());
}

#[test]
fn test_corrupted_record_skipped() {
    let (_host, env) = setup();
    let records: Vec<WalEntry> = (1..=3)
        .map(|lsn| WalEntry::new(lsn, Operation::Delete { key: vec![lsn as u8] }, 0))
        .collect();
    let mut bytes: Vec<u8> = records
        .iter()
        .flat_map(|r| r.serialize().unwrap())
        .collect();
    let first_len = records[0].serialized_size().unwrap();
    bytes[first_len + HEADER_SIZE] ^= 0x55;
    overwrite_raw(&env, &bytes);

    let (entries, result) = WalRecovery::recover(env, WAL_PATH).unwrap();
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 3);
    assert_eq!(
        entries.iter().map(|e| e.lsn).collect::<Vec<_>>(),
        vec![1, 3]
    );
}

#[test]
fn test_verify_does_not_modify() {
    let (host, env) = setup();
    write_log(&env, 3);
    append_raw(&env, &[0xAA; 7]);
    let before = host.contents(WAL_PATH).unwrap();

    let result = WalRecovery::verify(env, WAL_PATH).unwrap();
    assert_eq!(result.entries_recovered, 3);
    assert!(result.was_truncated);
    assert_eq!(host.contents(WAL_PATH).unwrap(), before);
}

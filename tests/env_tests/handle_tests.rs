//! Tests for the Handle Table and flag translation
//!
//! These tests verify:
//! - Mode translation for every flag combination
//! - EXCLUSIVE, CREATE and APPEND handling on open
//! - Read/write/seek semantics and EOF behaviour
//! - Handle bookkeeping (ids never reused, close always forgets)

use hostkv::env::{AccessFlags, HandleTable, SeekMode};
use hostkv::error::HostKvError;
use hostkv::host::{Host, HostMode, MemoryHost};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (MemoryHost, HandleTable) {
    (MemoryHost::new(), HandleTable::new())
}

fn rw_create() -> AccessFlags {
    AccessFlags::READ_WRITE | AccessFlags::CREATE
}

fn write_file(host: &MemoryHost, table: &mut HandleTable, path: &str, data: &[u8]) {
    let handle = table
        .open(host, path, AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE)
        .unwrap();
    table.write(handle, data).unwrap();
    table.close(handle).unwrap();
}

// =============================================================================
// Mode Translation
// =============================================================================

#[test]
fn test_translate_table() {
    let cases = [
        (AccessFlags::READ, HostMode::Read),
        (AccessFlags::WRITE | AccessFlags::TRUNCATE, HostMode::Write),
        (AccessFlags::WRITE, HostMode::ReadWrite),
        (AccessFlags::READ_WRITE | AccessFlags::TRUNCATE, HostMode::WriteRead),
        (AccessFlags::READ_WRITE, HostMode::ReadWrite),
        (AccessFlags::CREATE, HostMode::ReadWrite),
        (AccessFlags::empty(), HostMode::ReadWrite),
    ];
    for (flags, mode) in cases {
        assert_eq!(flags.translate(), mode, "flags {:?}", flags);
    }
}

#[test]
fn test_read_and_write_together_is_read_write() {
    let flags = AccessFlags::READ | AccessFlags::WRITE;
    assert_eq!(flags.translate(), HostMode::ReadWrite);
    assert_eq!(
        (flags | AccessFlags::TRUNCATE).translate(),
        HostMode::WriteRead
    );
}

#[test]
fn test_from_bits_rejects_unknown() {
    assert!(AccessFlags::from_bits(1 | 8).is_ok());
    assert!(matches!(
        AccessFlags::from_bits(1 << 12),
        Err(HostKvError::InvalidParameter(_))
    ));
}

// =============================================================================
// Open
// =============================================================================

#[test]
fn test_open_close_leaves_no_handle() {
    let (host, mut table) = setup();

    let handle = table.open(&host, "/a", rw_create()).unwrap();
    assert!(table.contains(handle));
    assert_eq!(host.open_file_count(), 1);

    table.close(handle).unwrap();
    assert!(table.is_empty());
    assert_eq!(host.open_file_count(), 0);
}

#[test]
fn test_exclusive_on_existing_fails_without_touching_file() {
    let (host, mut table) = setup();
    write_file(&host, &mut table, "/a", b"keep me");

    let result = table.open(
        &host,
        "/a",
        AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::EXCLUSIVE | AccessFlags::TRUNCATE,
    );
    assert!(matches!(result, Err(HostKvError::AlreadyExists(_))));
    assert!(table.is_empty());
    assert_eq!(host.open_file_count(), 0);
    assert_eq!(host.contents("/a").unwrap(), b"keep me");
}

#[test]
fn test_exclusive_on_missing_creates() {
    let (host, mut table) = setup();
    let handle = table
        .open(&host, "/fresh", rw_create() | AccessFlags::EXCLUSIVE)
        .unwrap();
    table.close(handle).unwrap();
    assert!(host.file_exists("/fresh"));
}

#[test]
fn test_create_with_read_materialises_file() {
    let (host, mut table) = setup();

    let handle = table
        .open(&host, "/new", AccessFlags::READ | AccessFlags::CREATE)
        .unwrap();
    assert!(host.file_exists("/new"));

    let mut buf = [0u8; 8];
    assert_eq!(table.read(handle, &mut buf).unwrap(), 0);
    table.close(handle).unwrap();
}

#[test]
fn test_read_missing_without_create_fails() {
    let (host, mut table) = setup();
    let result = table.open(&host, "/missing", AccessFlags::READ);
    assert!(matches!(result, Err(HostKvError::NotFound(_))));
    assert!(!host.file_exists("/missing"));
}

#[test]
fn test_write_without_truncate_keeps_contents() {
    let (host, mut table) = setup();
    write_file(&host, &mut table, "/a", b"hello world");

    let handle = table.open(&host, "/a", AccessFlags::WRITE).unwrap();
    table.write(handle, b"HELLO").unwrap();
    table.close(handle).unwrap();

    assert_eq!(host.contents("/a").unwrap(), b"HELLO world");
}

#[test]
fn test_append_positions_at_end() {
    let (host, mut table) = setup();
    write_file(&host, &mut table, "/log", b"one;");

    let handle = table
        .open(&host, "/log", AccessFlags::WRITE | AccessFlags::APPEND)
        .unwrap();
    table.write(handle, b"two;").unwrap();
    table.close(handle).unwrap();

    assert_eq!(host.contents("/log").unwrap(), b"one;two;");
}

#[test]
fn test_append_with_truncate_starts_empty() {
    let (host, mut table) = setup();
    write_file(&host, &mut table, "/log", b"old");

    let handle = table
        .open(
            &host,
            "/log",
            AccessFlags::WRITE | AccessFlags::APPEND | AccessFlags::TRUNCATE,
        )
        .unwrap();
    table.write(handle, b"new").unwrap();
    table.close(handle).unwrap();

    assert_eq!(host.contents("/log").unwrap(), b"new");
}

// =============================================================================
// Read / Write / Seek
// =============================================================================

#[test]
fn test_read_after_write_and_eof() {
    let (host, mut table) = setup();
    let handle = table
        .open(&host, "/a", AccessFlags::READ_WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE)
        .unwrap();

    assert_eq!(table.write(handle, b"0123456789").unwrap(), 10);
    assert_eq!(table.seek(handle, 0, SeekMode::Start).unwrap(), 0);

    let mut buf = [0u8; 32];
    let n = table.read(handle, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"0123456789");

    // At EOF: zero bytes, no error
    assert_eq!(table.read(handle, &mut buf).unwrap(), 0);
    table.close(handle).unwrap();
}

#[test]
fn test_short_buffer_reads_in_pieces() {
    let (host, mut table) = setup();
    write_file(&host, &mut table, "/a", b"abcdef");

    let handle = table.open(&host, "/a", AccessFlags::READ).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(table.read(handle, &mut buf).unwrap(), 4);
    assert_eq!(&buf, b"abcd");
    assert_eq!(table.read(handle, &mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"ef");
    table.close(handle).unwrap();
}

#[test]
fn test_seek_modes() {
    let (host, mut table) = setup();
    write_file(&host, &mut table, "/a", b"0123456789");

    let handle = table.open(&host, "/a", AccessFlags::READ).unwrap();
    assert_eq!(table.seek(handle, 3, SeekMode::Start).unwrap(), 3);
    assert_eq!(table.seek(handle, 2, SeekMode::Current).unwrap(), 5);
    assert_eq!(table.seek(handle, 4, SeekMode::End).unwrap(), 6);
    assert_eq!(table.seek(handle, 0, SeekMode::End).unwrap(), 10);

    table.seek(handle, 2, SeekMode::End).unwrap();
    let mut buf = [0u8; 8];
    let n = table.read(handle, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"89");
    table.close(handle).unwrap();
}

#[test]
fn test_seek_out_of_range_is_rejected() {
    let (host, mut table) = setup();
    write_file(&host, &mut table, "/a", b"0123456789");
    let handle = table.open(&host, "/a", AccessFlags::READ).unwrap();
    table.seek(handle, 4, SeekMode::Start).unwrap();

    assert!(matches!(
        table.seek(handle, 1 << 63, SeekMode::End),
        Err(HostKvError::InvalidParameter(_))
    ));
    assert!(matches!(
        table.seek(handle, u64::MAX, SeekMode::Current),
        Err(HostKvError::InvalidParameter(_))
    ));

    // Position is untouched by the rejected seeks
    assert_eq!(table.seek(handle, 0, SeekMode::Current).unwrap(), 4);

    // Largest backwards distance clamps to the start
    assert_eq!(table.seek(handle, i64::MAX as u64, SeekMode::End).unwrap(), 0);
    table.close(handle).unwrap();
}

#[test]
fn test_write_past_addressable_end_is_rejected() {
    let (host, mut table) = setup();
    let handle = table.open(&host, "/a", rw_create()).unwrap();

    table.seek(handle, u64::MAX - 1, SeekMode::Start).unwrap();
    assert!(matches!(
        table.write(handle, b"overflow"),
        Err(HostKvError::InvalidParameter(_))
    ));
    table.close(handle).unwrap();
    assert_eq!(host.contents("/a"), Some(Vec::new()));
}

#[test]
fn test_write_is_durable_without_close() {
    let (host, mut table) = setup();
    let writer = table
        .open(&host, "/a", AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE)
        .unwrap();
    table.write(writer, b"durable").unwrap();

    // A second handle sees the bytes while the writer is still open
    let reader = table.open(&host, "/a", AccessFlags::READ).unwrap();
    let mut buf = [0u8; 16];
    let n = table.read(reader, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"durable");

    table.close(reader).unwrap();
    table.close(writer).unwrap();
}

// =============================================================================
// Handle Bookkeeping
// =============================================================================

#[test]
fn test_unknown_handle() {
    let (_host, mut table) = setup();
    let mut buf = [0u8; 1];
    assert_eq!(
        table.read(42, &mut buf).unwrap_err(),
        HostKvError::InvalidHandle(42)
    );
    assert_eq!(table.write(42, b"x").unwrap_err(), HostKvError::InvalidHandle(42));
    assert_eq!(
        table.seek(42, 0, SeekMode::Start).unwrap_err(),
        HostKvError::InvalidHandle(42)
    );
    assert_eq!(table.close(42).unwrap_err(), HostKvError::InvalidHandle(42));
}

#[test]
fn test_handles_are_not_reused() {
    let (host, mut table) = setup();
    let first = table.open(&host, "/a", rw_create()).unwrap();
    table.close(first).unwrap();
    let second = table.open(&host, "/a", rw_create()).unwrap();
    assert_ne!(first, second);

    // The closed handle stays dead
    assert_eq!(table.close(first).unwrap_err(), HostKvError::InvalidHandle(first));
    table.close(second).unwrap();
}

#[test]
fn test_many_open_handles() {
    let (host, mut table) = setup();
    let handles: Vec<_> = (0..16)
        .map(|i| table.open(&host, &format!("/f{}", i), rw_create()).unwrap())
        .collect();
    assert_eq!(table.len(), 16);
    assert_eq!(host.open_file_count(), 16);

    for handle in handles {
        table.close(handle).unwrap();
    }
    assert!(table.is_empty());
    assert_eq!(host.open_file_count(), 0);
}

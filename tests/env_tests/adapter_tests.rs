//! Tests for the storage environment adapter
//!
//! These tests verify:
//! - Path operations (exists, size, delete, overwriting rename)
//! - Directory create/list/delete with the navigation cursor preserved
//! - Clock and temp directory passthroughs
//! - `EnvFile` stream behaviour on both hosts

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use hostkv::env::{AccessFlags, Env, EnvFile, HostEnv};
use hostkv::error::HostKvError;
use hostkv::host::{Host, MemoryHost, NativeHost};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn memory_env() -> (MemoryHost, Arc<HostEnv>) {
    let host = MemoryHost::new();
    let env = HostEnv::new(Arc::new(host.clone())).unwrap();
    (host, Arc::new(env))
}

fn native_env() -> (TempDir, String, Arc<HostEnv>) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_string_lossy().into_owned();
    let host: Arc<dyn Host> = Arc::new(NativeHost::with_root(temp_dir.path()));
    (temp_dir, root, Arc::new(HostEnv::new(host).unwrap()))
}

fn put_file(env: &HostEnv, path: &str, data: &[u8]) {
    let handle = env
        .open_file(path, AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE)
        .unwrap();
    env.write(handle, data).unwrap();
    env.close_file(handle).unwrap();
}

fn read_file(env: &HostEnv, path: &str) -> Vec<u8> {
    let handle = env.open_file(path, AccessFlags::READ).unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 7];
    loop {
        let n = env.read(handle, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    env.close_file(handle).unwrap();
    out
}

// =============================================================================
// Path Operations
// =============================================================================

#[test]
fn test_exists_and_size() {
    let (host, env) = memory_env();
    assert!(!env.exists("/a"));

    put_file(&env, "/a", b"12345");
    assert!(env.exists("/a"));
    assert_eq!(env.file_size("/a").unwrap(), 5);

    // The size probe is closed again
    assert_eq!(env.open_handles(), 0);
    assert_eq!(host.open_file_count(), 0);
}

#[test]
fn test_size_of_missing_file() {
    let (host, env) = memory_env();
    assert!(matches!(env.file_size("/nope"), Err(HostKvError::NotFound(_))));
    assert_eq!(host.open_file_count(), 0);
}

#[test]
fn test_delete_file() {
    let (_host, env) = memory_env();
    put_file(&env, "/a", b"x");
    env.delete_file("/a").unwrap();
    assert!(!env.exists("/a"));
    assert!(env.delete_file("/a").is_err());
}

#[test]
fn test_rename_overwrites_target() {
    let (_host, env) = memory_env();
    put_file(&env, "/from", b"new");
    put_file(&env, "/to", b"old");

    env.rename_file("/from", "/to").unwrap();

    assert!(!env.exists("/from"));
    assert_eq!(read_file(&env, "/to"), b"new");
}

#[test]
fn test_rename_missing_source() {
    let (_host, env) = memory_env();
    assert!(env.rename_file("/missing", "/to").is_err());
    assert!(!env.exists("/to"));
}

#[test]
fn test_rename_onto_itself_keeps_file() {
    let (_host, env) = memory_env();
    put_file(&env, "/a", b"keep");

    env.rename_file("/a", "/a").unwrap();
    assert!(env.exists("/a"));
    assert_eq!(read_file(&env, "/a"), b"keep");

    assert!(matches!(
        env.rename_file("/missing", "/missing"),
        Err(HostKvError::NotFound(_))
    ));
}

#[test]
fn test_relative_paths_on_native_host() {
    let (temp, _root, env) = native_env();

    // Directory and file operations agree on where "rel" lives
    env.create_dir("rel").unwrap();
    put_file(&env, "rel/data", b"relative");

    assert!(temp.path().join("rel").join("data").is_file());
    assert!(env.exists("rel/data"));
    assert_eq!(env.file_size("rel/data").unwrap(), 8);
    assert_eq!(read_file(&env, "rel/data"), b"relative");
    assert_eq!(env.list_children("rel").unwrap(), vec!["data"]);

    env.rename_file("rel/data", "rel/moved").unwrap();
    assert!(temp.path().join("rel").join("moved").is_file());
    assert!(!env.exists("rel/data"));
}

#[test]
fn test_rename_overwrites_on_native_host() {
    let (_temp, root, env) = native_env();
    let from = format!("{}/from", root);
    let to = format!("{}/to", root);
    put_file(&env, &from, b"fresh");
    put_file(&env, &to, b"stale");

    env.rename_file(&from, &to).unwrap();
    assert_eq!(read_file(&env, &to), b"fresh");
    assert!(!env.exists(&from));
}

// =============================================================================
// Directories
// =============================================================================

#[test]
fn test_create_list_delete_dir() {
    let (host, env) = memory_env();
    env.create_dir("/db/nested").unwrap();
    assert!(host.dir_exists("/db"));
    assert!(host.dir_exists("/db/nested"));

    put_file(&env, "/db/a", b"1");
    put_file(&env, "/db/b", b"2");

    let mut children = env.list_children("/db").unwrap();
    children.sort();
    assert_eq!(children, vec!["a", "b", "nested"]);

    env.delete_dir("/db/nested").unwrap();
    assert!(!host.dir_exists("/db/nested"));
}

#[test]
fn test_create_dir_is_idempotent() {
    let (_host, env) = memory_env();
    env.create_dir("/db").unwrap();
    env.create_dir("/db").unwrap();
}

#[test]
fn test_list_children_restores_cwd() {
    let (_host, env) = memory_env();
    env.create_dir("/db").unwrap();
    let before = env.current_dir();

    env.list_children("/db").unwrap();
    assert_eq!(env.current_dir(), before);

    // Failing listing leaves it alone too
    assert!(matches!(
        env.list_children("/does/not/exist"),
        Err(HostKvError::NotFound(_))
    ));
    assert_eq!(env.current_dir(), before);
}

#[test]
fn test_list_children_on_native_host() {
    let (_temp, root, env) = native_env();
    put_file(&env, &format!("{}/x", root), b"");
    env.create_dir(&format!("{}/sub", root)).unwrap();
    let before = env.current_dir();

    let mut children = env.list_children(&root).unwrap();
    children.sort();
    assert_eq!(children, vec!["sub", "x"]);
    assert_eq!(env.current_dir(), before);

    assert!(env.list_children(&format!("{}/missing", root)).is_err());
    assert_eq!(env.current_dir(), before);
}

// =============================================================================
// Clock and Temp Directory
// =============================================================================

#[test]
fn test_clock_passthrough() {
    let (host, env) = memory_env();
    // 2021-03-04T05:06:07.089Z, a Thursday
    host.set_clock(1_614_834_367_089);

    assert_eq!(env.now_millis(), 1_614_834_367_089);

    let t = env.local_time();
    assert_eq!(t.year, 2021);
    assert_eq!(t.month, 3);
    assert_eq!(t.day, 4);
    assert_eq!(t.weekday, 4);
    assert_eq!(t.hour, 5);
    assert_eq!(t.minute, 6);
    assert_eq!(t.second, 7);
    assert_eq!(t.millisecond, 89);
}

#[test]
fn test_temp_dir() {
    let (_host, env) = memory_env();
    assert_eq!(env.temp_dir().unwrap(), "/tmp");
}

// =============================================================================
// EnvFile
// =============================================================================

#[test]
fn test_env_file_stream() {
    let (host, env) = memory_env();
    let env: Arc<dyn Env> = env;

    let mut file = EnvFile::open(
        Arc::clone(&env),
        "/stream",
        AccessFlags::READ_WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE,
    )
    .unwrap();
    file.write_all(b"hello, stream").unwrap();

    file.seek(SeekFrom::Start(7)).unwrap();
    let mut word = String::new();
    file.read_to_string(&mut word).unwrap();
    assert_eq!(word, "stream");

    assert_eq!(file.seek(SeekFrom::End(-6)).unwrap(), 7);
    assert_eq!(file.seek(SeekFrom::Current(-2)).unwrap(), 5);
    assert!(file.seek(SeekFrom::End(1)).is_err());
    assert!(file.seek(SeekFrom::Current(-100)).is_err());

    drop(file);
    assert_eq!(host.open_file_count(), 0);
    assert_eq!(host.contents("/stream").unwrap(), b"hello, stream");
}

#[test]
fn test_env_file_read_exact_past_end_is_corruption() {
    let (_host, env) = memory_env();
    put_file(&env, "/short", b"abc");
    let env: Arc<dyn Env> = env;

    let mut file = EnvFile::open(env, "/short", AccessFlags::READ).unwrap();
    let mut buf = [0u8; 8];
    let err = file.read_exact(&mut buf).unwrap_err();
    assert!(matches!(HostKvError::from(err), HostKvError::Corruption(_)));
    file.close().unwrap();
}

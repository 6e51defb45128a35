//! Storage Environment Module
//!
//! The filesystem and clock capability the engine runs on, and the adapter
//! that implements it on top of a [`Host`](crate::host::Host).
//!
//! ## Layering
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Engine (WAL, tables, manifest, info log)                 │
//! │            uses  Arc<dyn Env>  /  EnvFile                │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//! ┌────────────────────────────▼─────────────────────────────┐
//! │ HostEnv (adapter)                                        │
//! │   ┌──────────────────┐   ┌─────────────────────────────┐ │
//! │   │ HandleTable      │   │ HostDir (navigation cursor) │ │
//! │   │ u64 → HostFile   │   │ save / restore around lists │ │
//! │   └────────┬─────────┘   └──────────────┬──────────────┘ │
//! │            │ AccessFlags::translate     │                │
//! └────────────┼────────────────────────────┼────────────────┘
//!              ▼                            ▼
//!         Host::open_file              Host::open_dir
//! ```
//!
//! ## Responsibilities
//! - POSIX-like open flags over the host's four open modes
//! - Every write flushed to the host before it is reported
//! - Overwriting rename over a non-overwriting host rename
//! - Directory listing with no visible effect on navigation state

mod adapter;
mod file;
mod flags;
mod handles;

pub use adapter::HostEnv;
pub use file::EnvFile;
pub use flags::AccessFlags;
pub use handles::HandleTable;

use std::convert::TryFrom;

use crate::error::{HostKvError, Result};

/// Opaque identifier of one open file
pub type FileHandle = u64;

/// Origin for [`Env::seek`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Absolute offset from the start of the file
    Start = 0,
    /// Distance back from the end of the file
    End = 1,
    /// Forward from the current position
    Current = 2,
}

impl TryFrom<u32> for SeekMode {
    type Error = HostKvError;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(SeekMode::Start),
            1 => Ok(SeekMode::End),
            2 => Ok(SeekMode::Current),
            other => Err(HostKvError::InvalidParameter(format!(
                "unknown seek mode {}",
                other
            ))),
        }
    }
}

/// Broken-down local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub year: u16,
    pub month: u8,
    /// 0 = Sunday
    pub weekday: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

/// Filesystem and clock capability required by the engine.
///
/// Paths are plain strings in the host's syntax. All fallible calls return
/// a [`HostKvError`]; nothing panics across this boundary.
pub trait Env: Send + Sync {
    // -------------------------------------------------------------------------
    // Handle operations
    // -------------------------------------------------------------------------
    fn open_file(&self, path: &str, flags: AccessFlags) -> Result<FileHandle>;

    /// Read into `buf`; 0 means end of file
    fn read(&self, handle: FileHandle, buf: &mut [u8]) -> Result<usize>;

    /// Write `data`; durable on the host once this returns
    fn write(&self, handle: FileHandle, data: &[u8]) -> Result<usize>;

    /// Returns the new absolute position
    fn seek(&self, handle: FileHandle, offset: u64, mode: SeekMode) -> Result<u64>;

    fn close_file(&self, handle: FileHandle) -> Result<()>;

    // -------------------------------------------------------------------------
    // Path operations
    // -------------------------------------------------------------------------
    fn exists(&self, path: &str) -> bool;

    fn file_size(&self, path: &str) -> Result<u64>;

    fn delete_file(&self, path: &str) -> Result<()>;

    /// Rename, replacing `to` if it exists
    fn rename_file(&self, from: &str, to: &str) -> Result<()>;

    /// Create `path` and any missing parents
    fn create_dir(&self, path: &str) -> Result<()>;

    fn delete_dir(&self, path: &str) -> Result<()>;

    /// Entry names directly under `path`, without `.` and `..`
    fn list_children(&self, path: &str) -> Result<Vec<String>>;

    // -------------------------------------------------------------------------
    // Misc
    // -------------------------------------------------------------------------
    fn temp_dir(&self) -> Result<String>;

    /// Wall clock, unix millis
    fn now_millis(&self) -> u64;

    fn local_time(&self) -> LocalTime;
}

/// Join a directory and a file name with the host separator
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

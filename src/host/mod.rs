//! Host Module
//!
//! The file and directory capability the storage environment is built on.
//!
//! The engine never touches the operating system directly: it talks to the
//! environment adapter, which in turn talks to a [`Host`]. A host hands out
//! open [`HostFile`] objects and a [`HostDir`] navigation object, and supplies
//! the wall clock, the calendar and a temp directory.
//!
//! The host API is deliberately *not* POSIX: files open in one of four
//! [`HostMode`]s, reads never create, rename does not overwrite, and
//! directory listing goes through a stateful "current directory" cursor.
//! Bridging those differences is the adapter's job, not the host's.
//!
//! ## Implementations
//! - [`NativeHost`] — backed by `std::fs`
//! - [`MemoryHost`] — everything in memory (tests, benchmarks)

mod memory;
mod native;

use thiserror::Error;

pub use memory::MemoryHost;
pub use native::NativeHost;

/// Result type for host capability calls
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Failures reported by the host capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("file not found")]
    FileNotFound,

    #[error("file already exists")]
    AlreadyExists,

    #[error("cannot open file")]
    CantOpen,

    /// The object is not open (or was already closed)
    #[error("unconfigured")]
    Unconfigured,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("operation failed: {0}")]
    Failed(String),
}

/// Open modes understood by the host.
///
/// These are the only four modes a host file can be opened in; there is no
/// separate create, exclusive or append switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Read only; the file must exist
    Read,
    /// Write only; creates or truncates
    Write,
    /// Read and write; the file must exist, contents kept
    ReadWrite,
    /// Read and write; creates or truncates
    WriteRead,
}

impl HostMode {
    pub fn can_read(&self) -> bool {
        !matches!(self, HostMode::Write)
    }

    pub fn can_write(&self) -> bool {
        !matches!(self, HostMode::Read)
    }

    /// Whether opening in this mode brings a missing file into existence
    pub fn creates(&self) -> bool {
        matches!(self, HostMode::Write | HostMode::WriteRead)
    }
}

/// Calendar fields as the host reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostDateTime {
    pub year: u16,
    /// 1..=12
    pub month: u8,
    /// 0 = Sunday
    pub weekday: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// One open host file.
///
/// Position is owned by the file object. Dropping an open file closes it.
pub trait HostFile: Send {
    /// Read up to `len` bytes from the current position
    fn get_buffer(&mut self, len: u64) -> HostResult<Vec<u8>>;

    /// Write `data` at the current position
    fn store_buffer(&mut self, data: &[u8]) -> HostResult<()>;

    /// Push buffered writes down to the host's storage
    fn flush(&mut self) -> HostResult<()>;

    /// Move to an absolute position
    fn seek(&mut self, position: u64) -> HostResult<()>;

    /// Move relative to the end of the file (`offset` is usually <= 0)
    fn seek_end(&mut self, offset: i64) -> HostResult<()>;

    fn len(&mut self) -> HostResult<u64>;

    fn position(&mut self) -> HostResult<u64>;

    fn absolute_path(&self) -> String;

    /// Close the file. A second close reports [`HostError::Unconfigured`].
    fn close(&mut self) -> HostResult<()>;
}

/// Directory navigation object with a "current directory" cursor.
///
/// Relative paths passed to any method resolve against the current
/// directory.
pub trait HostDir: Send {
    fn current_dir(&self) -> String;

    fn change_dir(&mut self, path: &str) -> HostResult<()>;

    /// Start listing the current directory
    fn list_dir_begin(&mut self, skip_navigational: bool) -> HostResult<()>;

    /// Next entry name, `None` when the listing is exhausted
    fn get_next(&mut self) -> Option<String>;

    fn list_dir_end(&mut self);

    /// Remove a file or an empty directory
    fn remove(&mut self, path: &str) -> HostResult<()>;

    /// Rename `from` to `to`; fails if `to` already exists
    fn rename(&mut self, from: &str, to: &str) -> HostResult<()>;

    /// Create a directory and any missing parents; existing is fine
    fn make_dir_recursive(&mut self, path: &str) -> HostResult<()>;
}

/// The host capability itself
pub trait Host: Send + Sync {
    fn open_file(&self, path: &str, mode: HostMode) -> HostResult<Box<dyn HostFile>>;

    /// True for existing regular files only
    fn file_exists(&self, path: &str) -> bool;

    /// A fresh navigation object positioned at the host's root directory
    fn open_dir(&self) -> HostResult<Box<dyn HostDir>>;

    fn system_time_msecs(&self) -> u64;

    fn datetime(&self) -> HostDateTime;

    fn temp_dir(&self) -> String;
}

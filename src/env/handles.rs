//! Handle Table
//!
//! Registry of open host files keyed by an opaque integer handle.
//!
//! Handles are allocated from a counter that only moves forward, so an id is
//! never reused for the lifetime of the table. A handle is removed from the
//! table when it is closed, whatever the host reports for the close itself.

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::error::{HostKvError, Result};
use crate::host::{Host, HostError, HostFile, HostMode};

use super::{AccessFlags, FileHandle, SeekMode};

struct OpenFile {
    file: Box<dyn HostFile>,
    /// Path as given to `open`, for error messages
    path: String,
}

/// Owned registry of open host files
pub struct HandleTable {
    files: HashMap<FileHandle, OpenFile>,
    last: FileHandle,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            last: 0,
        }
    }

    /// Number of open handles
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, handle: FileHandle) -> bool {
        self.files.contains_key(&handle)
    }

    /// Open `path` on `host` and register it.
    ///
    /// 1. EXCLUSIVE on an existing file fails before the host is touched
    /// 2. CREATE on a missing file whose mode cannot create: materialise it
    ///    with a write-mode open first
    /// 3. Open in the translated mode
    /// 4. APPEND without TRUNCATE: move to end of file
    pub fn open(&mut self, host: &dyn Host, path: &str, flags: AccessFlags) -> Result<FileHandle> {
        let exists = host.file_exists(path);

        if flags.contains(AccessFlags::EXCLUSIVE) && exists {
            return Err(HostKvError::AlreadyExists(path.to_string()));
        }

        let mode = flags.translate();

        if flags.contains(AccessFlags::CREATE) && !exists && !mode.creates() {
            trace!(path, "materialising file before open");
            let mut created = host
                .open_file(path, HostMode::Write)
                .map_err(|e| HostKvError::from_host("create", path, e))?;
            created
                .close()
                .map_err(|e| HostKvError::from_host("create", path, e))?;
        }

        let mut file = host
            .open_file(path, mode)
            .map_err(|e| HostKvError::from_host("open", path, e))?;

        if flags.contains(AccessFlags::APPEND) && !flags.contains(AccessFlags::TRUNCATE) {
            file.seek_end(0)
                .map_err(|e| HostKvError::from_host("seek", path, e))?;
        }

        self.last += 1;
        let handle = self.last;
        self.files.insert(
            handle,
            OpenFile {
                file,
                path: path.to_string(),
            },
        );

        trace!(handle, path, ?flags, ?mode, "opened");
        Ok(handle)
    }

    /// Read up to `buf.len()` bytes, never past end of file
    pub fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> Result<usize> {
        let open = self.entry(handle)?;
        let fail = |e| HostKvError::from_host("read", &open.path, e);

        let len = open.file.len().map_err(fail)?;
        let position = open.file.position().map_err(fail)?;
        let remaining = (buf.len() as u64).min(len.saturating_sub(position));
        if remaining == 0 {
            return Ok(0);
        }

        let data = open.file.get_buffer(remaining).map_err(fail)?;
        let count = data.len().min(buf.len());
        buf[..count].copy_from_slice(&data[..count]);

        trace!(handle, count, "read");
        Ok(count)
    }

    /// Write all of `data` and flush it to the host
    pub fn write(&mut self, handle: FileHandle, data: &[u8]) -> Result<usize> {
        let open = self.entry(handle)?;
        let fail = |e| HostKvError::from_host("write", &open.path, e);

        open.file.store_buffer(data).map_err(fail)?;
        open.file.flush().map_err(fail)?;

        trace!(handle, count = data.len(), "wrote");
        Ok(data.len())
    }

    /// Move the position and return the new absolute offset
    pub fn seek(&mut self, handle: FileHandle, offset: u64, mode: SeekMode) -> Result<u64> {
        let open = self.entry(handle)?;
        let fail = |e| HostKvError::from_host("seek", &open.path, e);

        let out_of_range = || {
            HostKvError::InvalidParameter(format!(
                "seek {} by {} ({:?}) is out of range",
                open.path, offset, mode
            ))
        };

        match mode {
            SeekMode::Start => open.file.seek(offset).map_err(fail)?,
            SeekMode::End => {
                let back = i64::try_from(offset).map_err(|_| out_of_range())?;
                open.file.seek_end(-back).map_err(fail)?;
            }
            SeekMode::Current => {
                let position = open.file.position().map_err(fail)?;
                let target = position.checked_add(offset).ok_or_else(out_of_range)?;
                open.file.seek(target).map_err(fail)?;
            }
        }

        open.file.position().map_err(fail)
    }

    /// Close and forget `handle`
    pub fn close(&mut self, handle: FileHandle) -> Result<()> {
        let mut open = self
            .files
            .remove(&handle)
            .ok_or(HostKvError::InvalidHandle(handle))?;

        let path = open.file.absolute_path();
        match open.file.close() {
            Ok(()) | Err(HostError::Unconfigured) => {
                trace!(handle, path = %path, "closed");
                Ok(())
            }
            Err(e) => {
                warn!(handle, path = %path, error = %e, "close failed");
                Err(HostKvError::from_host("close", &path, e))
            }
        }
    }

    fn entry(&mut self, handle: FileHandle) -> Result<&mut OpenFile> {
        self.files
            .get_mut(&handle)
            .ok_or(HostKvError::InvalidHandle(handle))
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

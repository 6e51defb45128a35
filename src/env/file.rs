//! RAII stream over an env handle
//!
//! [`EnvFile`] speaks `std::io::{Read, Write, Seek}` so engine code can use
//! `BufReader`, `read_exact` and friends. Dropping it closes the handle.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use tracing::warn;

use crate::error::{HostKvError, Result};

use super::{AccessFlags, Env, FileHandle, SeekMode};

pub struct EnvFile {
    env: Arc<dyn Env>,
    handle: FileHandle,
    path: String,
    closed: bool,
}

impl EnvFile {
    pub fn open(env: Arc<dyn Env>, path: &str, flags: AccessFlags) -> Result<Self> {
        let handle = env.open_file(path, flags)?;
        Ok(Self {
            env,
            handle,
            path: path.to_string(),
            closed: false,
        })
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Close explicitly, reporting the host's answer
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.env.close_file(self.handle)
    }

    fn seek_raw(&mut self, offset: u64, mode: SeekMode) -> io::Result<u64> {
        self.env
            .seek(self.handle, offset, mode)
            .map_err(io::Error::from)
    }
}

impl Read for EnvFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.env.read(self.handle, buf).map_err(io::Error::from)
    }
}

impl Write for EnvFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.env.write(self.handle, buf).map_err(io::Error::from)
    }

    /// Writes reach the host before `write` returns
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for EnvFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(offset) => self.seek_raw(offset, SeekMode::Start),
            SeekFrom::End(offset) if offset <= 0 => {
                self.seek_raw(offset.unsigned_abs(), SeekMode::End)
            }
            SeekFrom::End(_) => Err(io::Error::from(HostKvError::InvalidParameter(
                "seek past end of file".to_string(),
            ))),
            SeekFrom::Current(offset) if offset >= 0 => {
                self.seek_raw(offset as u64, SeekMode::Current)
            }
            SeekFrom::Current(offset) => {
                let here = self.seek_raw(0, SeekMode::Current)?;
                let target = here.checked_sub(offset.unsigned_abs()).ok_or_else(|| {
                    io::Error::from(HostKvError::InvalidParameter(
                        "seek before start of file".to_string(),
                    ))
                })?;
                self.seek_raw(target, SeekMode::Start)
            }
        }
    }
}

impl Drop for EnvFile {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.env.close_file(self.handle) {
                warn!(path = %self.path, error = %e, "closing file on drop failed");
            }
        }
    }
}

//! Storage environment adapter
//!
//! [`HostEnv`] implements [`Env`] over a [`Host`]: file handles go through the
//! [`HandleTable`], path operations go through one long-lived [`HostDir`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{HostKvError, Result};
use crate::host::{Host, HostDir, HostMode};

use super::{AccessFlags, Env, FileHandle, HandleTable, LocalTime, SeekMode};

/// [`Env`] backed by a host file and directory API
pub struct HostEnv {
    host: Arc<dyn Host>,
    handles: Mutex<HandleTable>,
    /// Shared navigation object; its current directory is observable state
    dir: Mutex<Box<dyn HostDir>>,
}

impl HostEnv {
    pub fn new(host: Arc<dyn Host>) -> Result<Self> {
        let dir = host
            .open_dir()
            .map_err(|e| HostKvError::from_host("open_dir", "", e))?;
        debug!(cwd = %dir.current_dir(), "environment ready");
        Ok(Self {
            host,
            handles: Mutex::new(HandleTable::new()),
            dir: Mutex::new(dir),
        })
    }

    /// Number of files currently open through this environment
    pub fn open_handles(&self) -> usize {
        self.handles.lock().len()
    }

    /// Current directory of the shared navigation object
    pub fn current_dir(&self) -> String {
        self.dir.lock().current_dir()
    }
}

impl Env for HostEnv {
    // =========================================================================
    // Handle passthroughs
    // =========================================================================

    fn open_file(&self, path: &str, flags: AccessFlags) -> Result<FileHandle> {
        self.handles.lock().open(self.host.as_ref(), path, flags)
    }

    fn read(&self, handle: FileHandle, buf: &mut [u8]) -> Result<usize> {
        self.handles.lock().read(handle, buf)
    }

    fn write(&self, handle: FileHandle, data: &[u8]) -> Result<usize> {
        self.handles.lock().write(handle, data)
    }

    fn seek(&self, handle: FileHandle, offset: u64, mode: SeekMode) -> Result<u64> {
        self.handles.lock().seek(handle, offset, mode)
    }

    fn close_file(&self, handle: FileHandle) -> Result<()> {
        self.handles.lock().close(handle)
    }

    // =========================================================================
    // Path operations
    // =========================================================================

    fn exists(&self, path: &str) -> bool {
        self.host.file_exists(path)
    }

    fn file_size(&self, path: &str) -> Result<u64> {
        let mut probe = self
            .host
            .open_file(path, HostMode::Read)
            .map_err(|e| HostKvError::from_host("size", path, e))?;

        let len = probe.len();
        if let Err(e) = probe.close() {
            warn!(path, error = %e, "closing size probe failed");
        }
        len.map_err(|e| HostKvError::from_host("size", path, e))
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        trace!(path, "delete file");
        self.dir
            .lock()
            .remove(path)
            .map_err(|e| HostKvError::from_host("delete", path, e))
    }

    fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        // Renaming onto itself leaves the file in place
        if from == to {
            return if self.host.file_exists(from) {
                Ok(())
            } else {
                Err(HostKvError::NotFound(from.to_string()))
            };
        }

        let mut dir = self.dir.lock();

        // Host rename refuses to overwrite
        if self.host.file_exists(to) {
            dir.remove(to)
                .map_err(|e| HostKvError::from_host("rename", to, e))?;
        }

        trace!(from, to, "rename");
        dir.rename(from, to)
            .map_err(|e| HostKvError::from_host("rename", from, e))
    }

    fn create_dir(&self, path: &str) -> Result<()> {
        trace!(path, "create dir");
        self.dir
            .lock()
            .make_dir_recursive(path)
            .map_err(|e| HostKvError::from_host("create_dir", path, e))
    }

    fn delete_dir(&self, path: &str) -> Result<()> {
        trace!(path, "delete dir");
        self.dir
            .lock()
            .remove(path)
            .map_err(|e| HostKvError::from_host("delete_dir", path, e))
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>> {
        let mut dir = self.dir.lock();
        let saved = dir.current_dir();

        let listed = list_in(&mut **dir, path);

        if let Err(e) = dir.change_dir(&saved) {
            warn!(dir = %saved, error = %e, "failed to restore current directory");
        }
        listed
    }

    // =========================================================================
    // Misc
    // =========================================================================

    fn temp_dir(&self) -> Result<String> {
        let dir = self.host.temp_dir();
        if dir.is_empty() {
            return Err(HostKvError::Io("host has no temp directory".to_string()));
        }
        Ok(dir)
    }

    fn now_millis(&self) -> u64 {
        self.host.system_time_msecs()
    }

    /// The calendar fields and the millisecond come from two separate host
    /// reads, so the millisecond can belong to a neighbouring second.
    fn local_time(&self) -> LocalTime {
        let now = self.host.datetime();
        let millisecond = (self.now_millis() % 1000) as u16;
        LocalTime {
            year: now.year,
            month: now.month,
            weekday: now.weekday,
            day: now.day,
            hour: now.hour,
            minute: now.minute,
            second: now.second,
            millisecond,
        }
    }
}

/// List `path` by navigating into it. Leaves `dir` wherever it ended up.
fn list_in(dir: &mut dyn HostDir, path: &str) -> Result<Vec<String>> {
    dir.change_dir(path)
        .map_err(|e| HostKvError::from_host("list", path, e))?;
    dir.list_dir_begin(true)
        .map_err(|e| HostKvError::from_host("list", path, e))?;

    let mut names = Vec::new();
    while let Some(name) = dir.get_next() {
        if name != "." && name != ".." {
            names.push(name);
        }
    }
    dir.list_dir_end();

    trace!(path, count = names.len(), "listed");
    Ok(names)
}

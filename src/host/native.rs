//! Native host
//!
//! [`Host`] implementation over `std::fs`. Rename keeps host semantics
//! (refuses to overwrite) even on platforms where the OS rename would
//! replace the target.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, Local, Timelike};

use super::{Host, HostDateTime, HostDir, HostError, HostFile, HostMode, HostResult};

/// Host backed by the local filesystem
#[derive(Debug, Clone)]
pub struct NativeHost {
    /// Where directory objects start navigating from
    root: PathBuf,
}

impl NativeHost {
    /// Native host rooted at the process working directory
    pub fn new() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self { root }
    }

    /// Native host whose relative paths resolve against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Relative paths resolve against `root`, as they do for a fresh
    /// directory object
    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for NativeHost {
    fn default() -> Self {
        Self::new()
    }
}

fn map_io(err: io::Error) -> HostError {
    match err.kind() {
        io::ErrorKind::NotFound => HostError::FileNotFound,
        io::ErrorKind::AlreadyExists => HostError::AlreadyExists,
        io::ErrorKind::PermissionDenied => HostError::CantOpen,
        _ => HostError::Failed(err.to_string()),
    }
}

impl Host for NativeHost {
    fn open_file(&self, path: &str, mode: HostMode) -> HostResult<Box<dyn HostFile>> {
        let mut options = OpenOptions::new();
        match mode {
            HostMode::Read => options.read(true),
            HostMode::Write => options.write(true).create(true).truncate(true),
            HostMode::ReadWrite => options.read(true).write(true),
            HostMode::WriteRead => options.read(true).write(true).create(true).truncate(true),
        };

        let path = self.resolve(path);
        let file = options.open(&path).map_err(map_io)?;
        Ok(Box::new(NativeFile {
            file: Some(file),
            path,
        }))
    }

    fn file_exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn open_dir(&self) -> HostResult<Box<dyn HostDir>> {
        if !self.root.is_dir() {
            return Err(HostError::FileNotFound);
        }
        Ok(Box::new(NativeDir {
            cwd: self.root.clone(),
            listing: None,
        }))
    }

    fn system_time_msecs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn datetime(&self) -> HostDateTime {
        let now = Local::now();
        HostDateTime {
            year: now.year() as u16,
            month: now.month() as u8,
            weekday: now.weekday().num_days_from_sunday() as u8,
            day: now.day() as u8,
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
        }
    }

    fn temp_dir(&self) -> String {
        std::env::temp_dir().to_string_lossy().into_owned()
    }
}

// =============================================================================
// Files
// =============================================================================

struct NativeFile {
    /// `None` once closed
    file: Option<File>,
    path: PathBuf,
}

impl NativeFile {
    fn file(&mut self) -> HostResult<&mut File> {
        self.file.as_mut().ok_or(HostError::Unconfigured)
    }
}

impl HostFile for NativeFile {
    fn get_buffer(&mut self, len: u64) -> HostResult<Vec<u8>> {
        let file = self.file()?;
        let mut buf = Vec::with_capacity(len as usize);
        file.take(len).read_to_end(&mut buf).map_err(map_io)?;
        Ok(buf)
    }

    fn store_buffer(&mut self, data: &[u8]) -> HostResult<()> {
        self.file()?.write_all(data).map_err(map_io)
    }

    fn flush(&mut self) -> HostResult<()> {
        let file = self.file()?;
        file.flush().map_err(map_io)?;
        file.sync_data().map_err(map_io)
    }

    fn seek(&mut self, position: u64) -> HostResult<()> {
        self.file()?.seek(SeekFrom::Start(position)).map_err(map_io)?;
        Ok(())
    }

    fn seek_end(&mut self, offset: i64) -> HostResult<()> {
        let file = self.file()?;
        let len = file.metadata().map_err(map_io)?.len() as i64;
        let target = (len + offset).max(0) as u64;
        file.seek(SeekFrom::Start(target)).map_err(map_io)?;
        Ok(())
    }

    fn len(&mut self) -> HostResult<u64> {
        Ok(self.file()?.metadata().map_err(map_io)?.len())
    }

    fn position(&mut self) -> HostResult<u64> {
        self.file()?.stream_position().map_err(map_io)
    }

    fn absolute_path(&self) -> String {
        fs::canonicalize(&self.path)
            .unwrap_or_else(|_| self.path.clone())
            .to_string_lossy()
            .into_owned()
    }

    fn close(&mut self) -> HostResult<()> {
        match self.file.take() {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Err(HostError::Unconfigured),
        }
    }
}

// =============================================================================
// Directories
// =============================================================================

struct NativeDir {
    cwd: PathBuf,
    listing: Option<std::vec::IntoIter<String>>,
}

impl NativeDir {
    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

impl HostDir for NativeDir {
    fn current_dir(&self) -> String {
        self.cwd.to_string_lossy().into_owned()
    }

    fn change_dir(&mut self, path: &str) -> HostResult<()> {
        let target = self.resolve(path);
        if !target.is_dir() {
            return Err(HostError::FileNotFound);
        }
        self.cwd = target;
        Ok(())
    }

    fn list_dir_begin(&mut self, skip_navigational: bool) -> HostResult<()> {
        let mut names = Vec::new();
        if !skip_navigational {
            names.push(".".to_string());
            names.push("..".to_string());
        }
        for entry in fs::read_dir(&self.cwd).map_err(map_io)? {
            let entry = entry.map_err(map_io)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        self.listing = Some(names.into_iter());
        Ok(())
    }

    fn get_next(&mut self) -> Option<String> {
        self.listing.as_mut().and_then(|it| it.next())
    }

    fn list_dir_end(&mut self) {
        self.listing = None;
    }

    fn remove(&mut self, path: &str) -> HostResult<()> {
        let target = self.resolve(path);
        let meta = fs::metadata(&target).map_err(map_io)?;
        if meta.is_dir() {
            fs::remove_dir(&target).map_err(map_io)
        } else {
            fs::remove_file(&target).map_err(map_io)
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> HostResult<()> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        if to.exists() {
            return Err(HostError::AlreadyExists);
        }
        fs::rename(&from, &to).map_err(map_io)
    }

    fn make_dir_recursive(&mut self, path: &str) -> HostResult<()> {
        fs::create_dir_all(self.resolve(path)).map_err(map_io)
    }
}

//! In-memory host
//!
//! Keeps every file as a `Vec<u8>` and every directory as a path in a set.
//! Used by tests and benchmarks: fast, deterministic, no filesystem.
//!
//! Open files work on a private copy of their contents and only publish it
//! on `flush()` or `close()`. A second handle on the same path therefore only
//! sees bytes the first handle has flushed, which is what makes write
//! durability observable in tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, TimeZone, Timelike, Utc};
use parking_lot::Mutex;

use super::{Host, HostDateTime, HostDir, HostError, HostFile, HostMode, HostResult};

const ROOT: &str = "/";
const TEMP_DIR: &str = "/tmp";

#[derive(Debug, Default)]
struct MemState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    /// Fixed clock in unix millis; `None` follows the system clock
    clock: Option<u64>,
    open_files: usize,
}

impl MemState {
    fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    /// Names of the direct children of `dir`
    fn children(&self, dir: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .keys()
            .chain(self.dirs.iter())
            .filter(|p| p.as_str() != ROOT && parent_of(p) == dir)
            .map(|p| file_name(p).to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn has_descendants(&self, dir: &str) -> bool {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files.keys().any(|p| p.starts_with(&prefix))
            || self.dirs.iter().any(|p| p.starts_with(&prefix))
    }
}

/// Host that lives entirely in memory.
///
/// Cloning shares the same underlying filesystem.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    state: Arc<Mutex<MemState>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        let mut state = MemState::default();
        state.dirs.insert(ROOT.to_string());
        state.dirs.insert(TEMP_DIR.to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Pin the clock to `millis` since the unix epoch
    pub fn set_clock(&self, millis: u64) {
        self.state.lock().clock = Some(millis);
    }

    /// Published contents of a file (what a fresh open would see)
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(&normalize(ROOT, path)).cloned()
    }

    pub fn dir_exists(&self, path: &str) -> bool {
        self.state.lock().is_dir(&normalize(ROOT, path))
    }

    /// Number of host files currently open
    pub fn open_file_count(&self) -> usize {
        self.state.lock().open_files
    }

    /// Every file path, sorted
    pub fn file_paths(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MemoryHost {
    fn open_file(&self, path: &str, mode: HostMode) -> HostResult<Box<dyn HostFile>> {
        let path = normalize(ROOT, path);
        let mut state = self.state.lock();

        if state.is_dir(&path) {
            return Err(HostError::CantOpen);
        }

        let data = match state.files.get(&path) {
            Some(existing) if !mode.creates() => existing.clone(),
            Some(_) => Vec::new(),
            None if mode.creates() => {
                if !state.is_dir(parent_of(&path)) {
                    return Err(HostError::CantOpen);
                }
                Vec::new()
            }
            None => return Err(HostError::FileNotFound),
        };

        // Creating modes materialise (or truncate) the file right away
        if mode.creates() {
            state.files.insert(path.clone(), Vec::new());
        }
        state.open_files += 1;

        Ok(Box::new(MemFile {
            state: Arc::clone(&self.state),
            path,
            data,
            position: 0,
            mode,
            open: true,
            dirty: false,
        }))
    }

    fn file_exists(&self, path: &str) -> bool {
        self.state.lock().files.contains_key(&normalize(ROOT, path))
    }

    fn open_dir(&self) -> HostResult<Box<dyn HostDir>> {
        Ok(Box::new(MemDir {
            state: Arc::clone(&self.state),
            cwd: ROOT.to_string(),
            listing: None,
        }))
    }

    fn system_time_msecs(&self) -> u64 {
        if let Some(fixed) = self.state.lock().clock {
            return fixed;
        }
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn datetime(&self) -> HostDateTime {
        let millis = self.system_time_msecs() as i64;
        let now = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now);
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
        TEMP_DIR.to_string()
    }
}

// =============================================================================
// Files
// =============================================================================

struct MemFile {
    state: Arc<Mutex<MemState>>,
    path: String,
    /// Private working copy, published on flush
    data: Vec<u8>,
    position: u64,
    mode: HostMode,
    open: bool,
    dirty: bool,
}

impl MemFile {
    fn ensure_open(&self) -> HostResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(HostError::Unconfigured)
        }
    }

    fn publish(&mut self) {
        if self.dirty {
            self.state
                .lock()
                .files
                .insert(self.path.clone(), self.data.clone());
            self.dirty = false;
        }
    }
}

impl HostFile for MemFile {
    fn get_buffer(&mut self, len: u64) -> HostResult<Vec<u8>> {
        self.ensure_open()?;
        if !self.mode.can_read() {
            return Err(HostError::Failed("file not open for reading".into()));
        }
        let start = (self.position as usize).min(self.data.len());
        let end = start.saturating_add(len as usize).min(self.data.len());
        self.position = end as u64;
        Ok(self.data[start..end].to_vec())
    }

    fn store_buffer(&mut self, data: &[u8]) -> HostResult<()> {
        self.ensure_open()?;
        if !self.mode.can_write() {
            return Err(HostError::Failed("file not open for writing".into()));
        }
        let (start, end) = usize::try_from(self.position)
            .ok()
            .and_then(|start| Some((start, start.checked_add(data.len())?)))
            .ok_or_else(|| {
                HostError::InvalidParameter(format!("write at {} overflows", self.position))
            })?;
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        self.position = end as u64;
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> HostResult<()> {
        self.ensure_open()?;
        self.publish();
        Ok(())
    }

    fn seek(&mut self, position: u64) -> HostResult<()> {
        self.ensure_open()?;
        self.position = position;
        Ok(())
    }

    fn seek_end(&mut self, offset: i64) -> HostResult<()> {
        self.ensure_open()?;
        self.position = (self.data.len() as i64 + offset).max(0) as u64;
        Ok(())
    }

    fn len(&mut self) -> HostResult<u64> {
        self.ensure_open()?;
        Ok(self.data.len() as u64)
    }

    fn position(&mut self) -> HostResult<u64> {
        self.ensure_open()?;
        Ok(self.position)
    }

    fn absolute_path(&self) -> String {
        self.path.clone()
    }

    fn close(&mut self) -> HostResult<()> {
        self.ensure_open()?;
        self.publish();
        self.open = false;
        self.state.lock().open_files -= 1;
        Ok(())
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        if self.open {
            let _ = self.close();
        }
    }
}

// =============================================================================
// Directories
// =============================================================================

struct MemDir {
    state: Arc<Mutex<MemState>>,
    cwd: String,
    listing: Option<VecDeque<String>>,
}

impl HostDir for MemDir {
    fn current_dir(&self) -> String {
        self.cwd.clone()
    }

    fn change_dir(&mut self, path: &str) -> HostResult<()> {
        let target = normalize(&self.cwd, path);
        if !self.state.lock().is_dir(&target) {
            return Err(HostError::FileNotFound);
        }
        self.cwd = target;
        Ok(())
    }

    fn list_dir_begin(&mut self, skip_navigational: bool) -> HostResult<()> {
        let state = self.state.lock();
        if !state.is_dir(&self.cwd) {
            return Err(HostError::FileNotFound);
        }
        let mut names: VecDeque<String> = state.children(&self.cwd).into();
        if !skip_navigational {
            names.push_front("..".to_string());
            names.push_front(".".to_string());
        }
        drop(state);
        self.listing = Some(names);
        Ok(())
    }

    fn get_next(&mut self) -> Option<String> {
        self.listing.as_mut().and_then(|names| names.pop_front())
    }

    fn list_dir_end(&mut self) {
        self.listing = None;
    }

    fn remove(&mut self, path: &str) -> HostResult<()> {
        let target = normalize(&self.cwd, path);
        let mut state = self.state.lock();
        if state.files.remove(&target).is_some() {
            return Ok(());
        }
        if target == ROOT || !state.is_dir(&target) {
            return Err(HostError::FileNotFound);
        }
        if state.has_descendants(&target) {
            return Err(HostError::Failed("directory not empty".into()));
        }
        state.dirs.remove(&target);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> HostResult<()> {
        let from = normalize(&self.cwd, from);
        let to = normalize(&self.cwd, to);
        let mut state = self.state.lock();

        if state.files.contains_key(&to) || state.is_dir(&to) {
            return Err(HostError::AlreadyExists);
        }
        if !state.is_dir(parent_of(&to)) {
            return Err(HostError::FileNotFound);
        }

        if let Some(data) = state.files.remove(&from) {
            state.files.insert(to, data);
            return Ok(());
        }
        if from == ROOT || !state.is_dir(&from) {
            return Err(HostError::FileNotFound);
        }

        // Move the directory and everything underneath it
        let prefix = format!("{}/", from);
        let moved_dirs: Vec<String> = state
            .dirs
            .iter()
            .filter(|p| **p == from || p.starts_with(&prefix))
            .cloned()
            .collect();
        for dir in moved_dirs {
            state.dirs.remove(&dir);
            state.dirs.insert(format!("{}{}", to, &dir[from.len()..]));
        }
        let moved_files: Vec<String> = state
            .files
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect();
        for file in moved_files {
            if let Some(data) = state.files.remove(&file) {
                state.files.insert(format!("{}{}", to, &file[from.len()..]), data);
            }
        }
        Ok(())
    }

    fn make_dir_recursive(&mut self, path: &str) -> HostResult<()> {
        let target = normalize(&self.cwd, path);
        let mut state = self.state.lock();
        if state.files.contains_key(&target) {
            return Err(HostError::AlreadyExists);
        }
        let mut current = String::new();
        for part in target.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            if state.files.contains_key(&current) {
                return Err(HostError::Failed(format!("{} is a file", current)));
            }
            state.dirs.insert(current.clone());
        }
        Ok(())
    }
}

// =============================================================================
// Path helpers
// =============================================================================

/// Absolute, `.`/`..`-free form of `path` resolved against `base`
fn normalize(base: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", base, path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(idx) => &path[..idx],
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::io::Write;
use std::sync::Arc;

use tracing::trace;

use crate::env::{AccessFlags, Env, EnvFile};
use crate::error::{HostKvError, Result};

use super::{Operation, WalEntry};

/// Writes entries to the WAL file
pub struct WalWriter {
    env: Arc<dyn Env>,
    path: String,
    /// `None` only between closing and reopening in `truncate`
    file: Option<EnvFile>,
    /// LSN the next append will get
    next_lsn: u64,
}

impl WalWriter {
    fn flags() -> AccessFlags {
        AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE
    }

    /// Start an empty log at `path`, replacing whatever was there
    ///
    /// LSNs continue from `next_lsn` (1 for a brand new database).
    pub fn open(env: Arc<dyn Env>, path: &str, next_lsn: u64) -> Result<Self> {
        let file = EnvFile::open(Arc::clone(&env), path, Self::flags())?;
        Ok(Self {
            env,
            path: path.to_string(),
            file: Some(file),
            next_lsn: next_lsn.max(1),
        })
    }

    /// Append an entry to the WAL; returns its LSN
    ///
    /// The record is on the host once this returns.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.next_lsn;
        let entry = WalEntry::new(lsn, operation, self.env.now_millis());
        let bytes = entry.serialize()?;

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| HostKvError::Io(format!("WAL {} is closed", self.path)))?;
        file.write_all(&bytes)?;

        self.next_lsn += 1;
        trace!(lsn, len = bytes.len(), "WAL append");
        Ok(lsn)
    }

    /// Empty the log after its entries became durable elsewhere
    ///
    /// LSNs keep counting up.
    pub fn truncate(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.close()?;
        }
        self.file = Some(EnvFile::open(
            Arc::clone(&self.env),
            &self.path,
            Self::flags(),
        )?);
        Ok(())
    }

    /// Get the LSN the next append will get
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Close the log file
    pub fn close(mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => file.close(),
            None => Ok(()),
        }
    }
}

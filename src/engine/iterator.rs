//! Database cursor
//!
//! A position in the merged key space of the memtable and every table.
//! The cursor remembers only the entry it sits on; each move asks the
//! database for the neighbour of that key, so writes made after the cursor
//! was created are visible to it.

use tracing::warn;

use crate::error::{HostKvError, Result, Status};
use crate::memtable::MemTableEntry;

use super::Db;

type Neighbour = Option<(Vec<u8>, MemTableEntry)>;

/// Bidirectional cursor over a [`Db`]
///
/// Starts invalid. Moving off either end leaves it invalid; `next`/`prev`
/// on an invalid cursor keep it invalid.
#[derive(Debug, Default)]
pub struct DbIterator {
    /// Key and value of the live entry under the cursor
    current: Option<(Vec<u8>, Vec<u8>)>,
    error: Option<HostKvError>,
}

impl DbIterator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seek_to_first(&mut self, db: &Db) {
        let found = Self::walk(None, |k| db.entry_after(k));
        self.settle(found);
    }

    pub fn seek_to_last(&mut self, db: &Db) {
        let found = Self::walk(None, |k| db.entry_before(k));
        self.settle(found);
    }

    /// Position at the first live key `>= target`
    pub fn seek(&mut self, db: &Db, target: &[u8]) {
        let found = match db.entry_at_or_after(target) {
            Ok(Some((key, MemTableEntry::Value(value)))) => Ok(Some((key, value))),
            Ok(Some((key, MemTableEntry::Tombstone))) => {
                Self::walk(Some(key), |k| db.entry_after(k))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        self.settle(found);
    }

    pub fn next(&mut self, db: &Db) {
        if let Some((key, _)) = self.current.take() {
            let found = Self::walk(Some(key), |k| db.entry_after(k));
            self.settle(found);
        }
    }

    pub fn prev(&mut self, db: &Db) {
        if let Some((key, _)) = self.current.take() {
            let found = Self::walk(Some(key), |k| db.entry_before(k));
            self.settle(found);
        }
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, v)| v.as_slice())
    }

    /// Outcome of the last move
    pub fn status(&self) -> Status {
        self.error.as_ref().map_or(Status::Ok, HostKvError::status)
    }

    /// The error that invalidated the cursor, if any
    pub fn error(&self) -> Option<&HostKvError> {
        self.error.as_ref()
    }

    fn settle(&mut self, found: Result<Option<(Vec<u8>, Vec<u8>)>>) {
        match found {
            Ok(entry) => {
                self.current = entry;
                self.error = None;
            }
            Err(e) => {
                warn!(error = %e, "cursor move failed");
                self.current = None;
                self.error = Some(e);
            }
        }
    }

    /// Step from `from` (exclusive) until a live entry or the end,
    /// skipping tombstones
    fn walk<F>(mut from: Option<Vec<u8>>, step: F) -> Result<Option<(Vec<u8>, Vec<u8>)>>
    where
        F: Fn(Option<&[u8]>) -> Result<Neighbour>,
    {
        loop {
            match step(from.as_deref())? {
                Some((key, MemTableEntry::Value(value))) => return Ok(Some((key, value))),
                Some((key, MemTableEntry::Tombstone)) => from = Some(key),
                None => return Ok(None),
            }
        }
    }
}

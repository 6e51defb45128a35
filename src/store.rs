//! Key-Value Store
//!
//! The caller-facing object: owns at most one open [`Db`] and the single
//! cursor over it, and exposes them as discrete calls that never fail loudly.
//!
//! ## States
//! ```text
//!            open(path) ok
//!   Closed ───────────────────▶ Open { cursor, db }
//!     ▲                            │
//!     └────────── close() ─────────┘   (also on drop)
//! ```
//!
//! Calls made in the wrong state are guarded no-ops: they log, record a
//! status and return the documented empty value. `try_*` variants return
//! the underlying [`Result`] instead.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Options;
use crate::engine::{Db, DbIterator};
use crate::env::Env;
use crate::error::{HostKvError, Result, Status};

/// Database plus its cursor. The cursor is declared first so it is
/// released before the database.
struct OpenDb {
    cursor: DbIterator,
    db: Db,
}

pub struct KvStore {
    env: Arc<dyn Env>,
    options: Options,
    state: Option<OpenDb>,
    /// Outcome of the most recent get/put/delete/open
    last_status: Status,
}

impl KvStore {
    /// A closed store whose databases open with [`Options::for_store`]
    pub fn new(env: Arc<dyn Env>) -> Self {
        Self::with_options(env, Options::for_store())
    }

    pub fn with_options(env: Arc<dyn Env>, options: Options) -> Self {
        Self {
            env,
            options,
            state: None,
            last_status: Status::Ok,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the database at `path`
    ///
    /// Fails with [`HostKvError::AlreadyOpen`] without touching the database
    /// that is already open.
    pub fn open(&mut self, path: &str) -> Result<()> {
        if self.state.is_some() {
            warn!(path, "store is already open");
            return Err(HostKvError::AlreadyOpen);
        }

        match Db::open(Arc::clone(&self.env), path, self.options.clone()) {
            Ok(db) => {
                debug!(path, "store opened");
                self.state = Some(OpenDb {
                    cursor: db.iter(),
                    db,
                });
                self.last_status = Status::Ok;
                Ok(())
            }
            Err(e) => {
                warn!(path, error = %e, "failed to open store");
                self.last_status = e.status();
                Err(e)
            }
        }
    }

    /// Close the database; a no-op when already closed
    pub fn close(&mut self) -> Result<()> {
        let OpenDb { cursor, db } = match self.state.take() {
            Some(state) => state,
            None => return Ok(()),
        };
        drop(cursor);

        let path = db.path().to_string();
        db.close().map_err(|e| {
            warn!(path = %path, error = %e, "error while closing store");
            e
        })?;
        debug!(path = %path, "store closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Status recorded by the most recent get/put/delete/open
    pub fn last_status(&self) -> Status {
        self.last_status
    }

    /// The open database, for inspection
    pub fn db(&self) -> Option<&Db> {
        self.state.as_ref().map(|state| &state.db)
    }

    // =========================================================================
    // Point operations
    // =========================================================================

    /// The stored value, or empty when absent, closed or failed
    pub fn get(&mut self, key: &[u8]) -> Vec<u8> {
        match self.try_get(key) {
            Ok(Some(value)) => value,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "get failed");
                Vec::new()
            }
        }
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        if let Err(e) = self.try_put(key, value) {
            warn!(error = %e, "put failed");
        }
    }

    pub fn delete(&mut self, key: &[u8]) {
        if let Err(e) = self.try_delete(key) {
            warn!(error = %e, "delete failed");
        }
    }

    /// A missing key is `Ok(None)` and records [`Status::NotFound`]
    pub fn try_get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let result = self.open_db().and_then(|state| state.db.get(key));
        self.last_status = match &result {
            Ok(Some(_)) => Status::Ok,
            Ok(None) => Status::NotFound,
            Err(e) => e.status(),
        };
        result
    }

    pub fn try_put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let result = self.open_db().and_then(|state| state.db.put(key, value));
        self.record(&result);
        result
    }

    pub fn try_delete(&mut self, key: &[u8]) -> Result<()> {
        let result = self.open_db().and_then(|state| state.db.delete(key));
        self.record(&result);
        result
    }

    // =========================================================================
    // Cursor
    // =========================================================================

    pub fn seek_to_first(&mut self) {
        if let Some(OpenDb { cursor, db }) = self.cursor_state("seek_to_first") {
            cursor.seek_to_first(db);
        }
    }

    pub fn seek_to_last(&mut self) {
        if let Some(OpenDb { cursor, db }) = self.cursor_state("seek_to_last") {
            cursor.seek_to_last(db);
        }
    }

    /// Position at the first key `>= target`
    pub fn seek(&mut self, target: &[u8]) {
        if let Some(OpenDb { cursor, db }) = self.cursor_state("seek") {
            cursor.seek(db, target);
        }
    }

    /// Advance; returns whether the cursor is still valid
    pub fn next(&mut self) -> bool {
        match self.cursor_state("next") {
            Some(OpenDb { cursor, db }) => {
                cursor.next(db);
                cursor.valid()
            }
            None => false,
        }
    }

    /// Step back; returns whether the cursor is still valid
    pub fn prev(&mut self) -> bool {
        match self.cursor_state("prev") {
            Some(OpenDb { cursor, db }) => {
                cursor.prev(db);
                cursor.valid()
            }
            None => false,
        }
    }

    pub fn valid(&self) -> bool {
        self.state
            .as_ref()
            .map_or(false, |state| state.cursor.valid())
    }

    /// Key under the cursor; empty (with a warning) when not valid
    pub fn key(&self) -> Vec<u8> {
        match self.state.as_ref().and_then(|state| state.cursor.key()) {
            Some(key) => key.to_vec(),
            None => {
                warn!("key() called on an invalid cursor");
                Vec::new()
            }
        }
    }

    /// Value under the cursor; empty (with a warning) when not valid
    pub fn value(&self) -> Vec<u8> {
        match self.state.as_ref().and_then(|state| state.cursor.value()) {
            Some(value) => value.to_vec(),
            None => {
                warn!("value() called on an invalid cursor");
                Vec::new()
            }
        }
    }

    /// Status of the cursor's last move
    pub fn cursor_status(&self) -> Status {
        self.state
            .as_ref()
            .map_or(Status::Ok, |state| state.cursor.status())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn open_db(&mut self) -> Result<&mut OpenDb> {
        self.state.as_mut().ok_or(HostKvError::NotOpen)
    }

    fn cursor_state(&mut self, op: &str) -> Option<&mut OpenDb> {
        if self.state.is_none() {
            warn!(op, "cursor operation on a closed store");
        }
        self.state.as_mut()
    }

    fn record(&mut self, result: &Result<()>) {
        self.last_status = match result {
            Ok(()) => Status::Ok,
            Err(e) => e.status(),
        };
    }
}

impl Drop for KvStore {
    fn drop(&mut self) {
        if self.state.is_some() {
            if let Err(e) = self.close() {
                warn!(error = %e, "failed to close store on drop");
            }
        }
    }
}

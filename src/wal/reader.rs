//! WAL Reader
//!
//! Handles reading entries from the WAL file.
//!
//! The whole log is read into memory on open; a log never outgrows one
//! memtable's worth of writes because it is reset after every flush.

use std::io::Read;
use std::sync::Arc;

use crate::env::{AccessFlags, Env, EnvFile};
use crate::error::{HostKvError, Result};

use super::entry::RecordHeader;
use super::{WalEntry, HEADER_SIZE};

/// One step through the log
#[derive(Debug)]
pub enum WalRecord {
    /// A record that passed its checks
    Valid(WalEntry),

    /// A complete record that failed its checks; reading continues after it
    Corrupted { offset: u64, reason: String },

    /// An incomplete record at the end of the log (interrupted append)
    PartialTail { offset: u64 },
}

/// Reads entries from the WAL file
pub struct WalReader {
    data: Vec<u8>,
    position: usize,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(env: Arc<dyn Env>, path: &str) -> Result<Self> {
        let mut file = EnvFile::open(env, path, AccessFlags::READ)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        file.close()?;
        Ok(Self::from_bytes(data))
    }

    /// Read records from an in-memory copy of a log
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }

    /// Byte offset of the next record
    pub fn position(&self) -> u64 {
        self.position as u64
    }

    /// The first `len` bytes of the log
    pub(super) fn prefix(&self, len: usize) -> &[u8] {
        &self.data[..len.min(self.data.len())]
    }

    /// Next record, `None` at a clean end of log
    pub fn next_record(&mut self) -> Option<WalRecord> {
        let offset = self.position;
        let rest = &self.data[offset..];
        if rest.is_empty() {
            return None;
        }

        let header = match RecordHeader::parse(rest) {
            Ok(header) => header,
            Err(_) => {
                self.position = self.data.len();
                return Some(WalRecord::PartialTail {
                    offset: offset as u64,
                });
            }
        };

        let record_len = HEADER_SIZE + header.len as usize;
        if rest.len() < record_len {
            self.position = self.data.len();
            return Some(WalRecord::PartialTail {
                offset: offset as u64,
            });
        }

        self.position += record_len;
        match WalEntry::deserialize(&rest[..record_len]) {
            Ok(entry) => Some(WalRecord::Valid(entry)),
            Err(e) => Some(WalRecord::Corrupted {
                offset: offset as u64,
                reason: e.to_string(),
            }),
        }
    }

    /// Read the next entry from the WAL
    ///
    /// Corrupted and partial records are reported as errors; reading can
    /// continue after a corrupted record.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.next_record() {
            None => Ok(None),
            Some(WalRecord::Valid(entry)) => Ok(Some(entry)),
            Some(WalRecord::Corrupted { offset, reason }) => Err(HostKvError::Corruption(
                format!("WAL record at {}: {}", offset, reason),
            )),
            Some(WalRecord::PartialTail { offset }) => Err(HostKvError::Corruption(format!(
                "WAL truncated at {}",
                offset
            ))),
        }
    }

    /// Iterate over all entries
    pub fn entries(self) -> WalIterator {
        WalIterator { reader: self }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_entry().transpose()
    }
}

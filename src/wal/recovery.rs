//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::env::{AccessFlags, Env, EnvFile};
use crate::error::Result;

use super::{WalEntry, WalReader, WalRecord};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether a partial record was found at the end of the log
    pub was_truncated: bool,

    /// Length of the log up to the partial record (whole log if none)
    pub valid_len: u64,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Skip corrupted entries
    /// 3. Cut a partial write off the end of the file
    /// 4. Return all valid entries in order
    pub fn recover(env: Arc<dyn Env>, path: &str) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let mut reader = WalReader::open(Arc::clone(&env), path)?;
        let (entries, result) = scan(&mut reader);

        if result.was_truncated {
            warn!(
                path,
                valid_len = result.valid_len,
                "dropping partial record at end of WAL"
            );
            rewrite_prefix(env, path, &reader, result.valid_len)?;
        }
        if result.entries_corrupted > 0 {
            warn!(path, skipped = result.entries_corrupted, "skipped corrupted WAL records");
        }

        debug!(
            path,
            recovered = result.entries_recovered,
            last_lsn = result.last_lsn,
            "WAL recovery finished"
        );
        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(env: Arc<dyn Env>, path: &str) -> Result<RecoveryResult> {
        let mut reader = WalReader::open(env, path)?;
        Ok(scan(&mut reader).1)
    }
}

fn scan(reader: &mut WalReader) -> (Vec<WalEntry>, RecoveryResult) {
    let mut entries = Vec::new();
    let mut result = RecoveryResult::default();

    while let Some(record) = reader.next_record() {
        match record {
            WalRecord::Valid(entry) => {
                result.entries_recovered += 1;
                result.last_lsn = entry.lsn;
                entries.push(entry);
            }
            WalRecord::Corrupted { offset, reason } => {
                debug!(offset, %reason, "corrupted WAL record");
                result.entries_corrupted += 1;
            }
            WalRecord::PartialTail { offset } => {
                result.was_truncated = true;
                result.valid_len = offset;
                return (entries, result);
            }
        }
    }

    result.valid_len = reader.position();
    (entries, result)
}

fn rewrite_prefix(env: Arc<dyn Env>, path: &str, reader: &WalReader, len: u64) -> Result<()> {
    let prefix = reader.prefix(len as usize);
    let mut file = EnvFile::open(
        env,
        path,
        AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE,
    )?;
    if !prefix.is_empty() {
        file.write_all(prefix)?;
    }
    file.close()
}

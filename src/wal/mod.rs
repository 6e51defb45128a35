//! Write-ahead log
//!
//! Every mutation is appended here before it touches the memtable, and the
//! log is replayed on open to rebuild whatever never reached a table.
//!
//! Every record goes to the environment in a single write, and the
//! environment flushes each write to the host before returning, so an
//! appended record survives a crash without a separate sync step.
//!
//! ## Record Layout
//! A log is a plain sequence of records, each
//! `lsn u64 | crc32 u32 | len u32 | payload[len]` (little-endian), where the
//! payload is the bincode-encoded [`WalEntry`] and the CRC covers lsn, len
//! and payload. A short or mismatching record ends replay; everything after
//! it is discarded.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE};
pub use reader::{WalIterator, WalReader, WalRecord};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;

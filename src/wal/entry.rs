//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::error::{HostKvError, Result};

/// LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation, timestamp: u64) -> Self {
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as a framed record: header followed by the bincode payload
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = self.payload()?;
        let len = payload.len() as u32;
        let crc = checksum(self.lsn, len, &payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode one framed record. `bytes` may extend past the record.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let header = RecordHeader::parse(bytes)?;
        let end = HEADER_SIZE + header.len as usize;
        if bytes.len() < end {
            return Err(HostKvError::Corruption(format!(
                "WAL record truncated: need {} bytes, have {}",
                end,
                bytes.len()
            )));
        }

        let payload = &bytes[HEADER_SIZE..end];
        if checksum(header.lsn, header.len, payload) != header.crc {
            return Err(HostKvError::Corruption(format!(
                "WAL record {} failed CRC check",
                header.lsn
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload)
            .map_err(|e| HostKvError::Corruption(format!("WAL payload: {}", e)))?;
        if entry.lsn != header.lsn {
            return Err(HostKvError::Corruption(format!(
                "WAL record LSN mismatch: header {}, payload {}",
                header.lsn, entry.lsn
            )));
        }
        Ok(entry)
    }

    /// Size of the framed record in bytes
    pub fn serialized_size(&self) -> Result<usize> {
        let payload = bincode::serialized_size(self)
            .map_err(|e| HostKvError::InvalidArgument(format!("WAL encode: {}", e)))?;
        Ok(HEADER_SIZE + payload as usize)
    }

    /// CRC of the record as it would be written
    pub fn compute_crc(&self) -> Result<u32> {
        let payload = self.payload()?;
        Ok(checksum(self.lsn, payload.len() as u32, &payload))
    }

    fn payload(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| HostKvError::InvalidArgument(format!("WAL encode: {}", e)))
    }
}

/// Fixed-size prefix of every record
#[derive(Debug, Clone, Copy)]
pub(super) struct RecordHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl RecordHeader {
    pub(super) fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(HostKvError::Corruption(format!(
                "WAL header truncated: {} bytes",
                bytes.len()
            )));
        }
        let mut buf = &bytes[..HEADER_SIZE];
        Ok(Self {
            lsn: buf.get_u64_le(),
            crc: buf.get_u32_le(),
            len: buf.get_u32_le(),
        })
    }
}

fn checksum(lsn: u64, len: u32, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_le_bytes());
    hasher.update(&len.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

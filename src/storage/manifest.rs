//! Manifest
//!
//! Records which tables make up the database. Replaced as a whole on every
//! change: written to `MANIFEST.tmp`, then renamed over `MANIFEST`.
//!
//! ```text
//! ┌──────────┬─────────┬─────────┬──────────────────────┐
//! │ "HKVM"(4)│ CRC (4) │ Len (4) │ bincode(Manifest)    │
//! └──────────┴─────────┴─────────┴──────────────────────┘
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Buf;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::{self, AccessFlags, Env, EnvFile};
use crate::error::{HostKvError, Result};

pub const MANIFEST_FILENAME: &str = "MANIFEST";
const TEMP_FILENAME: &str = "MANIFEST.tmp";
const MAGIC: &[u8; 4] = b"HKVM";
const HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Live table ids, newest first
    pub tables: Vec<u64>,
    /// Id the next new table gets
    pub next_table_id: u64,
    /// Highest LSN whose effects are inside the live tables
    pub last_lsn: u64,
}

impl Manifest {
    /// Load `{dir}/MANIFEST`; `Ok(None)` if there is none
    pub fn load(env: &Arc<dyn Env>, dir: &str) -> Result<Option<Self>> {
        let path = env::join(dir, MANIFEST_FILENAME);
        if !env.exists(&path) {
            return Ok(None);
        }

        let mut file = EnvFile::open(Arc::clone(env), &path, AccessFlags::READ)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        file.close()?;

        Self::decode(&data).map(Some)
    }

    /// Atomically replace `{dir}/MANIFEST` with this manifest
    pub fn store(&self, env: &Arc<dyn Env>, dir: &str) -> Result<()> {
        let temp = env::join(dir, TEMP_FILENAME);
        let path = env::join(dir, MANIFEST_FILENAME);

        let mut file = EnvFile::open(
            Arc::clone(env),
            &temp,
            AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE,
        )?;
        file.write_all(&self.encode()?)?;
        file.close()?;

        env.rename_file(&temp, &path)?;
        debug!(tables = ?self.tables, next_table_id = self.next_table_id, "manifest stored");
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)
            .map_err(|e| HostKvError::InvalidArgument(format!("manifest encode: {}", e)))?;

        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE || &data[..4] != MAGIC {
            return Err(HostKvError::Corruption("manifest header".to_string()));
        }
        let mut fields = &data[4..HEADER_SIZE];
        let crc = fields.get_u32_le();
        let len = fields.get_u32_le() as usize;

        let payload = data
            .get(HEADER_SIZE..HEADER_SIZE + len)
            .ok_or_else(|| HostKvError::Corruption("manifest truncated".to_string()))?;
        if crc32fast::hash(payload) != crc {
            return Err(HostKvError::Corruption("manifest checksum".to_string()));
        }

        bincode::deserialize(payload)
            .map_err(|e| HostKvError::Corruption(format!("manifest payload: {}", e)))
    }
}

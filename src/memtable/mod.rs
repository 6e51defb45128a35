//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation
//! - Neighbour lookups (`next_after` / `prev_before`) for cursors
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in RwLock:
//! - Ordered keys (required for SSTable generation and cursors)
//! - Range queries in both directions come for free

mod table;

pub use table::MemTable;

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// The value, or `None` for a tombstone
    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            MemTableEntry::Value(v) => Some(v),
            MemTableEntry::Tombstone => None,
        }
    }
}

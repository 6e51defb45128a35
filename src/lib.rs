//! # hostkv
//!
//! An embedded, ordered key-value store that keeps its files inside a host
//! application's own file and directory API instead of the operating system's:
//! - Storage environment adapter with POSIX-like open flags, seeks and
//!   overwriting renames over a narrower host capability
//! - Write-Ahead Logging (WAL) with crash recovery
//! - Sorted tables with bloom filters, compression and a block cache
//! - A guarded key-value façade with a bidirectional cursor
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Plugin (method dispatch)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              KvStore (Closed / Open, cursor)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Db (engine)                             │
//! │    ┌─────────┐     ┌───────────┐     ┌──────────────────┐   │
//! │    │   WAL   │     │ MemTable  │     │ Storage (tables, │   │
//! │    │(Append) │     │ (RwLock)  │     │ manifest, cache) │   │
//! │    └─────────┘     └───────────┘     └──────────────────┘   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Arc<dyn Env>
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │        HostEnv (HandleTable + mode translation)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Arc<dyn Host>
//!                       ▼
//!              host files and directories
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod host;
pub mod env;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

pub mod store;
pub mod plugin;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{InfoLog, Options};
pub use engine::{Db, DbIterator};
pub use env::{AccessFlags, Env, EnvFile, HostEnv, SeekMode};
pub use error::{ErrorCode, HostKvError, Result, Status};
pub use host::{Host, MemoryHost, NativeHost};
pub use plugin::{Plugin, Variant};
pub use store::KvStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of hostkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

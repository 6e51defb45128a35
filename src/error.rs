//! Error types for hostkv
//!
//! Provides a unified error type for the environment adapter, the embedded
//! engine and the key-value façade, plus the two flattened views callers
//! need: the engine [`Status`] and the integer [`ErrorCode`].

use std::io;

use thiserror::Error;

use crate::host::HostError;

/// Result type alias using HostKvError
pub type Result<T> = std::result::Result<T, HostKvError>;

/// Unified error type for hostkv operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostKvError {
    // -------------------------------------------------------------------------
    // Environment Errors
    // -------------------------------------------------------------------------
    #[error("Invalid file handle: {0}")]
    InvalidHandle(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Corruption: {0}")]
    Corruption(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Façade State Errors
    // -------------------------------------------------------------------------
    #[error("Database is already open")]
    AlreadyOpen,

    #[error("Database is not open")]
    NotOpen,
}

/// Outcome of an engine operation, as the engine itself reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ok,
    NotFound,
    Corruption,
    IoError,
    InvalidArgument,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

/// Integer codes returned through the caller-facing method surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    Failed = 1,
    InvalidHandle = 2,
    NotFound = 3,
    AlreadyExists = 4,
    Io = 5,
    InvalidParameter = 6,
    Corruption = 7,
    AlreadyOpen = 8,
    NotOpen = 9,
}

impl HostKvError {
    /// Translate a host capability failure for operation `op` on `path`
    pub fn from_host(op: &str, path: &str, err: HostError) -> Self {
        match err {
            HostError::FileNotFound => HostKvError::NotFound(path.to_string()),
            HostError::AlreadyExists => HostKvError::AlreadyExists(path.to_string()),
            HostError::InvalidParameter(msg) => {
                HostKvError::InvalidParameter(format!("{} {}: {}", op, path, msg))
            }
            other => HostKvError::Io(format!("{} {}: {}", op, path, other)),
        }
    }

    /// The engine status this error is reported as
    pub fn status(&self) -> Status {
        match self {
            HostKvError::NotFound(_) => Status::NotFound,
            HostKvError::Corruption(_) => Status::Corruption,
            HostKvError::InvalidHandle(_)
            | HostKvError::AlreadyExists(_)
            | HostKvError::Io(_) => Status::IoError,
            HostKvError::InvalidParameter(_)
            | HostKvError::InvalidArgument(_)
            | HostKvError::AlreadyOpen
            | HostKvError::NotOpen => Status::InvalidArgument,
        }
    }

    /// The integer code this error is reported as through the method surface
    pub fn code(&self) -> ErrorCode {
        match self {
            HostKvError::InvalidHandle(_) => ErrorCode::InvalidHandle,
            HostKvError::NotFound(_) => ErrorCode::NotFound,
            HostKvError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            HostKvError::Io(_) => ErrorCode::Io,
            HostKvError::InvalidParameter(_) => ErrorCode::InvalidParameter,
            HostKvError::Corruption(_) => ErrorCode::Corruption,
            HostKvError::InvalidArgument(_) => ErrorCode::Failed,
            HostKvError::AlreadyOpen => ErrorCode::AlreadyOpen,
            HostKvError::NotOpen => ErrorCode::NotOpen,
        }
    }
}

impl From<Result<()>> for ErrorCode {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => ErrorCode::Ok,
            Err(e) => e.code(),
        }
    }
}

// -----------------------------------------------------------------------------
// std::io bridging (EnvFile speaks std::io so engine code can use io helpers)
// -----------------------------------------------------------------------------

impl From<HostKvError> for io::Error {
    fn from(err: HostKvError) -> Self {
        let kind = match err {
            HostKvError::NotFound(_) => io::ErrorKind::NotFound,
            HostKvError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            HostKvError::InvalidParameter(_) | HostKvError::InvalidArgument(_) => {
                io::ErrorKind::InvalidInput
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

impl From<io::Error> for HostKvError {
    fn from(err: io::Error) -> Self {
        if err.get_ref().map_or(false, |inner| inner.is::<HostKvError>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(original) = inner.downcast::<HostKvError>() {
                    return *original;
                }
            }
            return HostKvError::Io("unrecoverable io error".to_string());
        }

        match err.kind() {
            io::ErrorKind::UnexpectedEof => {
                HostKvError::Corruption(format!("truncated file: {}", err))
            }
            io::ErrorKind::NotFound => HostKvError::NotFound(err.to_string()),
            _ => HostKvError::Io(err.to_string()),
        }
    }
}

//! Plugin glue
//!
//! Process-level setup and the dynamic method surface a host scripting layer
//! calls into. One [`Plugin`] owns the shared [`HostEnv`]; every store it
//! hands out runs its databases on that environment.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

use crate::env::{Env, HostEnv};
use crate::error::{ErrorCode, HostKvError, Result};
use crate::host::Host;
use crate::store::KvStore;

/// Method names registered with the host, in registration order
pub const METHODS: &[&str] = &[
    "open",
    "close",
    "is_open",
    "get_data",
    "store_data",
    "delete_data",
    "next",
    "prev",
    "valid",
    "seek_to_first",
    "seek_to_last",
    "key",
    "value",
];

/// Install the global tracing subscriber.
///
/// Reads `RUST_LOG`, falling back to `info,hostkv=debug`. Safe to call more
/// than once; a subscriber installed elsewhere is left alone.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hostkv=debug"));

    let installed = subscriber_fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        debug!("logging initialised");
    }
}

/// Loaded plugin: the environment every store shares
pub struct Plugin {
    env: Arc<dyn Env>,
}

impl Plugin {
    /// Set up logging and the storage environment over `host`
    pub fn init(host: Arc<dyn Host>) -> Result<Self> {
        init_logging();
        let env: Arc<dyn Env> = Arc::new(HostEnv::new(host)?);
        info!("hostkv v{} ready", crate::VERSION);
        Ok(Self { env })
    }

    /// A new, closed store instance
    pub fn new_store(&self) -> KvStore {
        KvStore::new(Arc::clone(&self.env))
    }

    pub fn env(&self) -> &Arc<dyn Env> {
        &self.env
    }
}

/// Dynamically typed argument or return value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    Nil,
    Bool(bool),
    Int(i64),
    String(String),
    Bytes(Vec<u8>),
}

impl Variant {
    fn type_name(&self) -> &'static str {
        match self {
            Variant::Nil => "nil",
            Variant::Bool(_) => "bool",
            Variant::Int(_) => "int",
            Variant::String(_) => "string",
            Variant::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nil => write!(f, "nil"),
            Variant::Bool(b) => write!(f, "{}", b),
            Variant::Int(i) => write!(f, "{}", i),
            Variant::String(s) => write!(f, "{:?}", s),
            Variant::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<ErrorCode> for Variant {
    fn from(code: ErrorCode) -> Self {
        Variant::Int(code as i64)
    }
}

/// Invoke `method` on `store` with positional `args`
///
/// `open` and `close` report failure as an integer [`ErrorCode`]; other
/// methods follow the store's guarded semantics. Unknown methods and bad
/// arguments are errors.
pub fn call(store: &mut KvStore, method: &str, args: &[Variant]) -> Result<Variant> {
    let expected = match method {
        "open" | "get_data" | "delete_data" => 1,
        "store_data" => 2,
        _ if METHODS.contains(&method) => 0,
        _ => {
            return Err(HostKvError::InvalidArgument(format!(
                "unknown method {}",
                method
            )))
        }
    };
    if args.len() != expected {
        return Err(HostKvError::InvalidArgument(format!(
            "{} takes {} argument(s), got {}",
            method,
            expected,
            args.len()
        )));
    }

    let result = match method {
        "open" => Variant::from(ErrorCode::from(store.open(string_arg(method, &args[0])?))),
        "close" => Variant::from(ErrorCode::from(store.close())),
        "is_open" => Variant::Bool(store.is_open()),
        "get_data" => Variant::Bytes(store.get(bytes_arg(method, &args[0])?)),
        "store_data" => {
            store.put(bytes_arg(method, &args[0])?, bytes_arg(method, &args[1])?);
            Variant::Nil
        }
        "delete_data" => {
            store.delete(bytes_arg(method, &args[0])?);
            Variant::Nil
        }
        "next" => Variant::Bool(store.next()),
        "prev" => Variant::Bool(store.prev()),
        "valid" => Variant::Bool(store.valid()),
        "seek_to_first" => {
            store.seek_to_first();
            Variant::Nil
        }
        "seek_to_last" => {
            store.seek_to_last();
            Variant::Nil
        }
        "key" => Variant::Bytes(store.key()),
        "value" => Variant::Bytes(store.value()),
        _ => Variant::Nil,
    };
    Ok(result)
}

fn string_arg<'a>(method: &str, arg: &'a Variant) -> Result<&'a str> {
    match arg {
        Variant::String(s) => Ok(s),
        other => Err(HostKvError::InvalidArgument(format!(
            "{} expects a string, got {}",
            method,
            other.type_name()
        ))),
    }
}

/// Byte blobs; strings are accepted as their UTF-8 bytes
fn bytes_arg<'a>(method: &str, arg: &'a Variant) -> Result<&'a [u8]> {
    match arg {
        Variant::Bytes(b) => Ok(b),
        Variant::String(s) => Ok(s.as_bytes()),
        other => Err(HostKvError::InvalidArgument(format!(
            "{} expects bytes, got {}",
            method,
            other.type_name()
        ))),
    }
}

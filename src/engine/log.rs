//! Info log
//!
//! Human-readable engine events written through the environment to
//! `{db}/LOG`. The previous run's log is kept as `LOG.old`.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::config::InfoLog;
use crate::env::{self, AccessFlags, Env, EnvFile};
use crate::error::Result;

pub const LOG_FILENAME: &str = "LOG";
pub const OLD_LOG_FILENAME: &str = "LOG.old";

pub struct InfoLogger {
    env: Arc<dyn Env>,
    /// `None` when logging is discarded
    file: Option<Mutex<EnvFile>>,
}

impl InfoLogger {
    pub fn open(env: Arc<dyn Env>, dir: &str, mode: InfoLog) -> Result<Self> {
        let file = match mode {
            InfoLog::Discard => None,
            InfoLog::File => {
                let path = env::join(dir, LOG_FILENAME);
                if env.exists(&path) {
                    env.rename_file(&path, &env::join(dir, OLD_LOG_FILENAME))?;
                }
                let file = EnvFile::open(
                    Arc::clone(&env),
                    &path,
                    AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE,
                )?;
                Some(Mutex::new(file))
            }
        };
        Ok(Self { env, file })
    }

    /// Append one timestamped line. Failures are reported to tracing only.
    pub fn log(&self, args: fmt::Arguments<'_>) {
        let file = match &self.file {
            Some(file) => file,
            None => return,
        };

        let t = self.env.local_time();
        let line = format!(
            "{:04}/{:02}/{:02}-{:02}:{:02}:{:02}.{:03} {}\n",
            t.year, t.month, t.day, t.hour, t.minute, t.second, t.millisecond, args
        );
        if let Err(e) = file.lock().write_all(line.as_bytes()) {
            warn!(error = %e, "info log write failed");
        }
    }
}

//! Logging setup for db-pager.
//!
//! The interactive shell logs to a file so log lines do not interleave with
//! printed pages; one-shot runs log to stderr. `RUST_LOG` overrides the
//! default level of either.

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "db-pager.log";

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// `db-pager.log` in the platform state directory, truncated per run.
    File,
    /// Standard error, warnings and above by default.
    Stderr,
}

impl LogTarget {
    /// Level used when `RUST_LOG` is unset.
    pub fn default_level(self) -> &'static str {
        match self {
            LogTarget::File => "info",
            LogTarget::Stderr => "warn",
        }
    }
}

/// Installs the global subscriber for `target`.
///
/// A log file that cannot be created leaves logging disabled with a warning
/// on stderr; the run itself goes on.
pub fn init(target: LogTarget) {
    match target {
        LogTarget::Stderr => install(target, io::stderr, true),
        LogTarget::File => match open_log_file() {
            Ok(file) => install(target, file, false),
            Err(e) => eprintln!("Warning: logging disabled, {}: {e}", get_log_path().display()),
        },
    }
}

fn install<W>(target: LogTarget, writer: W, ansi: bool)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(target.default_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .init();
}

fn open_log_file() -> io::Result<File> {
    let path = get_log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Path of the shell's log file: the state directory where the platform has
/// one, the config directory otherwise, the temp directory as a last resort.
pub fn get_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("db-pager"))
        .unwrap_or_else(std::env::temp_dir)
        .join(LOG_FILE)
}

//! Tracing configuration and log routing.
//!
//! Logs always go to stdout through a compact formatter. A second, ANSI-free layer mirrors them
//! to disk unless disabled:
//!
//! - `SUMMARIZER_LOG_FILE=<path>` appends to an explicit file.
//! - `SUMMARIZER_LOG_FILE=off` disables file logging entirely.
//! - otherwise logs land in `logs/summarizer.log`.
//!
//! The file writer is non-blocking so that per-chunk progress lines never stall generation.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "SUMMARIZER_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE_NAME: &str = "summarizer.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where the file layer should write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Append to the given file.
    File(PathBuf),
    /// Write `summarizer.log` inside the given directory.
    Directory(PathBuf),
    /// Only log to stdout.
    Disabled,
}

impl LogDestination {
    /// Resolve the destination from the raw value of `SUMMARIZER_LOG_FILE`.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(off) if off.eq_ignore_ascii_case("off") => Self::Disabled,
            Some(path) if !path.is_empty() => Self::File(PathBuf::from(path)),
            _ => Self::Directory(PathBuf::from(DEFAULT_LOG_DIR)),
        }
    }
}

/// Configure tracing subscribers for stdout and file logging.
///
/// Respects `RUST_LOG` for filtering and defaults to `info`.
pub fn init_tracing() {
    let setting = std::env::var(LOG_FILE_ENV).ok();
    let destination = LogDestination::from_setting(setting.as_deref());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match open_writer(&destination) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

fn open_writer(destination: &LogDestination) -> Option<NonBlocking> {
    match destination {
        LogDestination::Disabled => None,
        LogDestination::File(path) => open_append(path),
        LogDestination::Directory(dir) => {
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {}: {err}", dir.display());
                return None;
            }
            let appender = tracing_appender::rolling::never(dir, DEFAULT_LOG_FILE_NAME);
            Some(keep_alive(tracing_appender::non_blocking(appender)))
        }
    }
}

fn open_append(path: &Path) -> Option<NonBlocking> {
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => Some(keep_alive(tracing_appender::non_blocking(file))),
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}

fn keep_alive((writer, guard): (NonBlocking, WorkerGuard)) -> NonBlocking {
    let _ = LOG_GUARD.set(guard);
    writer
}

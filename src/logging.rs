//! Tracing configuration and log routing.
//!
//! The CLI logs to stderr (so stdout stays free for the text/JSON export
//! sinks to share, spec §6 "-q suppresses stdout") using a compact
//! formatter, and optionally appends to a file when `PARAMFINDER_LOG_FILE`
//! is set. A non-blocking writer is used to minimize contention on hot
//! paths.

use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stderr and optional file logging.
///
/// Respects `RUST_LOG` for filtering; absent that, `quiet` maps to `error`
/// and anything else to `info` (spec §6 `-q`).
pub fn init_tracing(quiet: bool) {
    let default_level = if quiet { "error" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Build a non-blocking writer for file logging.
///
/// Returns `None` unless `PARAMFINDER_LOG_FILE` is set and the target file
/// can be opened.
fn configure_file_writer() -> Option<NonBlocking> {
    let path = std::env::var("PARAMFINDER_LOG_FILE").ok()?;
    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {path}: {err}");
            None
        }
    }
}

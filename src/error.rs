//! Crate-level error aggregation.
//!
//! Each component owns its own `thiserror` enum (`TransportError`,
//! `ConfigError`, `ExportError`, ...). [`CoreError`] aggregates them for the
//! binary's top-level `Result`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::export::ExportError;
use crate::transport::TransportError;

/// Top-level error type returned by the binary's `run` function.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration failed validation or a required flag was missing.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Wordlist could not be read from disk.
    #[error("failed to read wordlist: {0}")]
    Wordlist(#[from] std::io::Error),
    /// An export sink failed to write its output.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    /// Transport failed to construct (e.g. invalid client configuration).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

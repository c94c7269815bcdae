#![deny(missing_docs)]

//! Core library for a differential binary-search HTTP parameter-discovery
//! engine.

/// Baseline calibration: which fingerprint facets are stable enough to
/// signal real change.
pub mod calibrator;
/// CLI-flag validation and translation into run settings.
pub mod config;
/// Per-run and per-target context (settings, kill switch, error streak).
pub mod context;
/// Command-line surface.
pub mod cli;
/// Crate-level error aggregation.
pub mod error;
/// Export sinks: JSON, text, HTML, Burp proxy replay.
pub mod export;
/// Heuristic extraction of candidate parameter names from response bodies.
pub mod extractor;
/// Response fingerprinting and facet-ordered diffing.
pub mod fingerprint;
/// Structured logging and tracing setup.
pub mod logging;
/// Recursive bisection of candidate chunks.
pub mod narrower;
/// Per-target orchestration tying calibration, narrowing, and scoring
/// together.
pub mod orchestrator;
/// Passive parameter-name ingestion from archived URLs.
pub mod passive;
/// Single-chunk probing and facet-based anomaly detection.
pub mod bruter;
/// Confirmer, risk scorer, and lightweight vulnerability probes.
pub mod scorer;
/// HTTP transport.
pub mod transport;
/// The request template and payload types shared by every component.
pub mod request;
/// Bundled wordlists, casing transforms, and the `special.json` overrides.
pub mod wordlist;

#[cfg(test)]
pub(crate) mod test_support;

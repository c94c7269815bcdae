//! CLI-flag validation and translation into a [`RunConfig`]/[`RequestTemplate`]
//! pair (spec §6, §9 expansion item A).
//!
//! Parses once at startup and fails fast with a descriptive [`ConfigError`]
//! on any invalid combination (spec §7 "Configuration error ... fatal at
//! startup").

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::cli::Cli;
use crate::context::{RunConfig, WaitPolicy};
use crate::request::{Include, Method, RequestTemplate};
use crate::wordlist::Casing;

/// Errors encountered while validating CLI flags (spec §7 "Configuration error").
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `-u` nor `-i` was given.
    #[error("no target(s) specified: pass -u <url> or -i <file>")]
    NoTarget,
    /// `-m` named an unsupported method.
    #[error("invalid method: {0}")]
    InvalidMethod(String),
    /// `--casing` named an unsupported style.
    #[error("invalid casing style: {0}")]
    InvalidCasing(String),
    /// `--headers` contained a line with no `:` separator.
    #[error("invalid header line (expected \"Name: value\"): {0}")]
    InvalidHeaderLine(String),
    /// `-i` pointed at a file that could not be read.
    #[error("failed to read import file {path}: {source}")]
    ImportFile {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Everything resolved once from CLI flags: the shared [`RunConfig`], the
/// per-target [`RequestTemplate`] stub (missing only its final `url`), the
/// target URL list, and passive/export options the orchestrator's caller
/// needs but the core algorithm does not.
#[derive(Debug)]
pub struct ResolvedRun {
    /// Settings shared by every target in the batch.
    pub run_config: RunConfig,
    /// Request shape shared by every target (`url` is replaced per target).
    pub request_template: RequestTemplate,
    /// Target URLs to scan, in the order they should be processed.
    pub targets: Vec<String>,
    /// Wordlist file path or bundled alias (spec §6 `-w`).
    pub wordlist: String,
    /// Casing style to apply to the wordlist, if any.
    pub casing: Option<Casing>,
    /// Passive-source flag value, if `--passive` was given.
    pub passive: Option<String>,
    /// JSON export path.
    pub json_file: Option<String>,
    /// Text export path.
    pub text_file: Option<String>,
    /// Burp proxy address.
    pub burp_proxy: Option<String>,
    /// HTML export path.
    pub html_file: Option<String>,
    /// Suppress stdout.
    pub quiet: bool,
}

fn parse_headers(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut headers = BTreeMap::new();
    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidHeaderLine(line.to_string()))?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(headers)
}

fn parse_include(raw: &str) -> Include {
    if raw.contains(Include::PLACEHOLDER) {
        return Include::Template(raw.to_string());
    }
    let mut map = BTreeMap::new();
    let mut saw_pair = false;
    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
            saw_pair = true;
        }
    }
    if saw_pair {
        Include::Map(map)
    } else {
        Include::Template(raw.to_string())
    }
}

/// Clamp the configured chunk size against the wordlist length
/// (spec §6 `-c`, §8 "Boundary behavior").
#[must_use]
pub fn clamp_chunk_size(requested: usize, wordlist_len: usize) -> usize {
    if wordlist_len < requested {
        (wordlist_len / 2).max(1)
    } else {
        requested.max(1)
    }
}

/// Validate and translate parsed CLI flags into a [`ResolvedRun`]
/// (spec §6, §9 item A "Configuration").
pub fn resolve(cli: Cli, wordlist_len: usize) -> Result<ResolvedRun, ConfigError> {
    if cli.url.is_none() && cli.import_file.is_none() {
        return Err(ConfigError::NoTarget);
    }

    let method: Method = cli
        .method
        .parse()
        .map_err(|_| ConfigError::InvalidMethod(cli.method.clone()))?;

    let casing = cli
        .casing
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(|_| ConfigError::InvalidCasing(cli.casing.clone().unwrap_or_default()))?;

    let headers = match &cli.headers {
        Some(raw) => parse_headers(raw)?,
        None => BTreeMap::new(),
    };
    let include = cli.include.as_deref().map(parse_include).unwrap_or(Include::None);

    let requested_chunk = cli.chunks.unwrap_or_else(|| method.default_chunk_size());
    let chunk_size = clamp_chunk_size(requested_chunk, wordlist_len);

    let forces_single_worker = cli.stable || cli.delay.is_some_and(|delay| delay > 0.0);
    let threads = if forces_single_worker { 1 } else { cli.threads.max(1) };

    let wait_policy = if cli.stable {
        WaitPolicy::Stable
    } else if cli.stealth {
        WaitPolicy::Stealth
    } else if let Some(delay) = cli.delay.filter(|delay| *delay > 0.0) {
        WaitPolicy::Fixed(Duration::from_secs_f64(delay))
    } else {
        WaitPolicy::None
    };

    let targets = match (&cli.url, &cli.import_file) {
        (Some(url), _) => vec![url.clone()],
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|source| ConfigError::ImportFile {
                path: path.clone(),
                source,
            })?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect(),
        (None, None) => unreachable!("checked above"),
    };

    let run_config = RunConfig {
        threads,
        chunk_size,
        timeout: Duration::from_secs_f64(cli.timeout.max(0.0)),
        rate_limit: cli.rate_limit,
        wait_policy,
        ..RunConfig::default()
    };

    let request_template = RequestTemplate {
        url: String::new(),
        method,
        headers,
        include,
        disable_redirects: true,
    };

    Ok(ResolvedRun {
        run_config,
        request_template,
        targets,
        wordlist: cli.wordlist,
        casing,
        passive: cli.passive,
        json_file: cli.json_file,
        text_file: cli.text_file,
        burp_proxy: cli.burp_proxy,
        html_file: cli.html_file,
        quiet: cli.quiet,
    })
}

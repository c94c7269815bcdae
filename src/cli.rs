//! Command-line surface (spec §6, §9 expansion item B1).
//!
//! Mirrors `arjun/__main__.py`'s `parse_args`, translated to a `clap`
//! derive struct.

use clap::Parser;

/// Differential binary-search HTTP parameter-discovery engine.
#[derive(Parser, Debug)]
#[command(name = "paramfinder", version, about)]
pub struct Cli {
    /// Single target URL.
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Newline-delimited URL list to import.
    #[arg(short = 'i', long = "import")]
    pub import_file: Option<String>,

    /// Wordlist file path, or one of the bundled aliases `small`/`medium`/`large`.
    #[arg(short = 'w', long = "wordlist", default_value = "large")]
    pub wordlist: String,

    /// Request method: GET, POST, JSON, or XML.
    #[arg(short = 'm', long = "method", default_value = "GET")]
    pub method: String,

    /// Worker pool size.
    #[arg(short = 't', long = "threads", default_value_t = 5)]
    pub threads: usize,

    /// Initial chunk size (clamped against the wordlist length).
    #[arg(short = 'c', long = "chunks")]
    pub chunks: Option<usize>,

    /// Per-request delay in seconds (forces pool size to 1).
    #[arg(short = 'd', long = "delay")]
    pub delay: Option<f64>,

    /// Request timeout in seconds.
    #[arg(short = 'T', long = "timeout", default_value_t = 15.0)]
    pub timeout: f64,

    /// Maximum requests per second across all workers.
    #[arg(long = "rate-limit", default_value_t = 9999)]
    pub rate_limit: u32,

    /// Extra headers, newline-separated `Name: value` pairs.
    #[arg(long = "headers")]
    pub headers: Option<String>,

    /// Body template (containing `$arjun$`) or a fixed `key=value` map,
    /// newline-separated, merged into every payload.
    #[arg(long = "include")]
    pub include: Option<String>,

    /// Prefer stability over speed: long random delays, pool size 1.
    #[arg(long = "stable", default_value_t = false)]
    pub stable: bool,

    /// Short random jitter plus randomized headers.
    #[arg(long = "stealth", default_value_t = false)]
    pub stealth: bool,

    /// Never follow redirects (always applied regardless of this flag).
    #[arg(long = "disable-redirects", default_value_t = false)]
    pub disable_redirects: bool,

    /// Casing style applied to every wordlist entry: snake_case, camelCase, flatcase.
    #[arg(long = "casing")]
    pub casing: Option<String>,

    /// Augment the wordlist from passive sources; optional explicit host.
    #[arg(long = "passive", num_args = 0..=1, default_missing_value = "-")]
    pub passive: Option<String>,

    /// JSON output file path.
    #[arg(short = 'o', long = "output-json")]
    pub json_file: Option<String>,

    /// Text output file path.
    #[arg(long = "oT")]
    pub text_file: Option<String>,

    /// Burp Suite proxy output; optional `host:port`, defaults to `127.0.0.1:8080`.
    #[arg(long = "oB", num_args = 0..=1, default_missing_value = "127.0.0.1:8080")]
    pub burp_proxy: Option<String>,

    /// HTML output file path.
    #[arg(long = "oH")]
    pub html_file: Option<String>,

    /// Suppress stdout.
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    pub quiet: bool,
}

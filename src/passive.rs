//! Passive parameter-name ingestion (spec §9 expansion item B3).
//!
//! The original's `fetch_params(host)` mentions wayback, commoncrawl and otx
//! as sources; this crate implements the Wayback CDX endpoint as the
//! representative, networked default behind a [`PassiveSource`] trait so the
//! narrower/bruter/calibrator tests never need network access, and so more
//! sources can be added later without touching call sites.

use std::collections::BTreeSet;

use async_trait::async_trait;
use url::Url;

/// A source of candidate parameter names gathered without ever hitting the
/// target itself (spec §1 "passive parameter-source ingestion", out of core
/// scope but wired up here as a concrete default).
#[async_trait]
pub trait PassiveSource: Send + Sync {
    /// Collect parameter names observed in archived URLs for `host`.
    async fn fetch_params(&self, host: &str) -> BTreeSet<String>;
}

/// Wayback Machine CDX API-backed [`PassiveSource`].
pub struct WaybackSource {
    client: reqwest::Client,
}

impl WaybackSource {
    /// Build a new Wayback-backed source using a fresh HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WaybackSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PassiveSource for WaybackSource {
    async fn fetch_params(&self, host: &str) -> BTreeSet<String> {
        let endpoint = format!(
            "http://web.archive.org/cdx/search/cdx?url={host}/*&output=json&fl=original&collapse=urlkey&limit=5000"
        );
        let response = match self.client.get(&endpoint).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(%host, error = %err, "wayback CDX request failed");
                return BTreeSet::new();
            }
        };
        let rows: Vec<Vec<String>> = match response.json().await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::debug!(%host, error = %err, "wayback CDX response was not the expected shape");
                return BTreeSet::new();
            }
        };
        rows.into_iter()
            .skip(1) // first row is the CDX header ["original"]
            .filter_map(|row| row.into_iter().next())
            .flat_map(|archived_url| query_keys(&archived_url))
            .collect()
    }
}

fn query_keys(archived_url: &str) -> BTreeSet<String> {
    Url::parse(archived_url)
        .map(|url| {
            url.query_pairs()
                .map(|(key, _)| key.into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve the effective passive-source host from the `--passive` flag value
/// and the primary target URL (spec §9 Open Questions: "only an import file,
/// no `-u`" is a documented no-op, not an error).
#[must_use]
pub fn resolve_host(passive_flag: Option<&str>, primary_url: Option<&str>) -> Option<String> {
    match passive_flag? {
        "-" => primary_url.and_then(|url| Url::parse(url).ok()).and_then(|url| {
            url.host_str().map(ToString::to_string)
        }),
        host => Some(host.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_host_defaults_to_primary_urls_host() {
        let host = resolve_host(Some("-"), Some("https://example.test/page"));
        assert_eq!(host.as_deref(), Some("example.test"));
    }

    #[test]
    fn resolve_host_is_none_without_primary_url_or_explicit_host() {
        let host = resolve_host(Some("-"), None);
        assert!(host.is_none());
    }

    #[test]
    fn resolve_host_uses_explicit_host_when_given() {
        let host = resolve_host(Some("explicit.test"), Some("https://example.test/"));
        assert_eq!(host.as_deref(), Some("explicit.test"));
    }

    #[test]
    fn query_keys_extracts_param_names_from_an_archived_url() {
        let keys = query_keys("https://example.test/search?q=1&sort=asc");
        assert!(keys.contains("q"));
        assert!(keys.contains("sort"));
    }
}

//! Export sinks (spec §6 "Export formats", §9 expansion item B4).
//!
//! Mirrors `arjun/core/exporter.py` facet for facet: JSON, text, HTML, and a
//! Burp-proxy replay. Each sink is a free function taking the accumulated
//! per-target results, the way the original's `json_export`/`text_export`/
//! `html_export`/`burp_export` each take the whole `result` dict.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::request::Method;
use crate::scorer::CandidateRecord;

/// Failure writing or transmitting an export (spec §7 treats this as an I/O
/// concern external to the core algorithm, but still needs a typed error at
/// the binary boundary).
#[derive(Debug, Error)]
pub enum ExportError {
    /// Could not write to the destination file.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Destination path.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The Burp replay request failed at the transport level.
    #[error("burp replay request failed: {0}")]
    BurpRequest(#[from] reqwest::Error),
}

/// One target's accumulated result, keyed by URL for the JSON/HTML sinks
/// (spec §6 JSON export shape).
#[derive(Clone, Debug, Serialize)]
pub struct TargetExport {
    /// Request method used against this target.
    pub method: Method,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Confirmed, scored parameters.
    pub params: Vec<ExportedParam>,
}

/// A [`CandidateRecord`] reduced to its exportable fields.
#[derive(Clone, Debug, Serialize)]
pub struct ExportedParam {
    /// Parameter name.
    pub name: String,
    /// Risk score.
    pub score: u32,
    /// Risk band, serialized as its display string.
    pub risk: String,
    /// Probe finding tags.
    pub vulns: Vec<String>,
}

impl From<&CandidateRecord> for ExportedParam {
    fn from(record: &CandidateRecord) -> Self {
        Self {
            name: record.name.clone(),
            score: record.score,
            risk: record.risk.to_string(),
            vulns: record.findings.clone(),
        }
    }
}

fn write_file(path: &str, contents: &str) -> Result<(), ExportError> {
    std::fs::File::create(Path::new(path))
        .and_then(|mut file| file.write_all(contents.as_bytes()))
        .map_err(|source| ExportError::Io {
            path: path.to_string(),
            source,
        })
}

/// Write the full result set as pretty-printed JSON (spec §6 "JSON").
pub fn json_export(path: &str, results: &BTreeMap<String, TargetExport>) -> Result<(), ExportError> {
    let rendered = serde_json::to_string_pretty(results).unwrap_or_default();
    write_file(path, &rendered)
}

fn query_string(params: &[ExportedParam]) -> String {
    let pairs: Vec<String> = params
        .iter()
        .map(|p| format!("{}={}", p.name, crate::request::populate_value(&p.name)))
        .collect();
    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

/// Append one line per URL to a text file (spec §6 "Text").
pub fn text_export(path: &str, results: &BTreeMap<String, TargetExport>) -> Result<(), ExportError> {
    let mut out = String::new();
    for (url, export) in results {
        let clean_url = url.trim_start_matches('/');
        match export.method {
            Method::PostJson => {
                let payload: BTreeMap<&str, String> = export
                    .params
                    .iter()
                    .map(|p| (p.name.as_str(), crate::request::populate_value(&p.name)))
                    .collect();
                let body = serde_json::to_string(&payload).unwrap_or_default();
                out.push_str(clean_url);
                out.push('\t');
                out.push_str(&body);
                out.push('\n');
            }
            Method::Get => {
                out.push_str(clean_url);
                out.push_str(&query_string(&export.params));
                out.push('\n');
            }
            Method::PostForm | Method::PostXml => {
                out.push_str(clean_url);
                out.push('\t');
                out.push_str(query_string(&export.params).trim_start_matches('?'));
                out.push('\n');
            }
        }
    }
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    contents.push_str(&out);
    write_file(path, &contents)
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Parameter Discovery Report</title>
<style>
body { font-family: sans-serif; margin: 20px; background: #f0f0f0; }
.container { max-width: 1000px; margin: auto; background: white; padding: 20px; border-radius: 8px; }
h1 { color: #333; border-bottom: 2px solid #4CAF50; padding-bottom: 10px; }
.target { margin-bottom: 30px; border: 1px solid #ddd; padding: 15px; border-radius: 4px; }
.target h2 { margin-top: 0; color: #2196F3; font-size: 18px; word-break: break-all; }
table { width: 100%; border-collapse: collapse; margin-top: 10px; }
th, td { padding: 10px; text-align: left; border-bottom: 1px solid #eee; }
th { background-color: #f8f9fa; color: #555; }
.risk-CRITICAL { color: #d32f2f; font-weight: bold; }
.risk-HIGH { color: #f57c00; font-weight: bold; }
.risk-MEDIUM { color: #fbc02d; font-weight: bold; }
.risk-LOW { color: #388e3c; font-weight: bold; }
.vuln-tag { display: inline-block; background: #ffebee; color: #c62828; padding: 2px 6px; border-radius: 4px; font-size: 12px; margin-right: 5px; }
</style>
</head>
<body>
<div class="container">
<h1>Parameter Discovery Report</h1>
{content}
</div>
</body>
</html>
"#;

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Write a static HTML report, one table per target (spec §6 "HTML").
pub fn html_export(path: &str, results: &BTreeMap<String, TargetExport>) -> Result<(), ExportError> {
    let mut content = String::new();
    for (url, export) in results {
        let mut rows = String::new();
        for p in &export.params {
            let vulns: String = p
                .vulns
                .iter()
                .map(|v| format!("<span class=\"vuln-tag\">{}</span>", html_escape(v)))
                .collect();
            rows.push_str(&format!(
                "<tr><td>{}</td><td class=\"risk-{}\">{}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(&p.name),
                p.risk,
                p.risk,
                p.score,
                vulns
            ));
        }
        content.push_str(&format!(
            "<div class=\"target\"><h2>{} {}</h2><table><thead><tr><th>Parameter</th><th>Risk</th><th>Score</th><th>Findings</th></tr></thead><tbody>\n{}</tbody></table></div>\n",
            export.method,
            html_escape(url),
            rows
        ));
    }
    let rendered = HTML_TEMPLATE.replace("{content}", &content);
    write_file(path, &rendered)
}

/// Replay each discovered parameter set once through an HTTP proxy
/// (spec §6 "Burp").
pub async fn burp_export(
    proxy: &str,
    results: &BTreeMap<String, TargetExport>,
) -> Result<(), ExportError> {
    let proxy_url = if proxy.contains(':') {
        proxy.to_string()
    } else {
        format!("127.0.0.1:{proxy}")
    };
    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{proxy_url}"))?)
        .proxy(reqwest::Proxy::https(format!("http://{proxy_url}"))?)
        .danger_accept_invalid_certs(true)
        .build()?;

    for (url, export) in results {
        let payload: BTreeMap<&str, String> = export
            .params
            .iter()
            .map(|p| (p.name.as_str(), crate::request::populate_value(&p.name)))
            .collect();
        let builder = match export.method {
            Method::Get => client.get(url).query(&payload),
            Method::PostJson => client.post(url).json(&payload),
            Method::PostForm | Method::PostXml => client.post(url).form(&payload),
        };
        let builder = export
            .headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value));
        let _ = builder.send().await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Facet;
    use crate::scorer::Risk;

    fn sample_results() -> BTreeMap<String, TargetExport> {
        let record = CandidateRecord {
            name: "debug".to_string(),
            reason: Facet::Tags,
            score: 50,
            risk: Risk::High,
            findings: vec!["Reflected Input (Potential XSS)".to_string()],
        };
        let mut results = BTreeMap::new();
        results.insert(
            "http://example.test/".to_string(),
            TargetExport {
                method: Method::Get,
                headers: BTreeMap::new(),
                params: vec![ExportedParam::from(&record)],
            },
        );
        results
    }

    #[test]
    fn json_export_round_trips_through_serde() {
        let results = sample_results();
        let rendered = serde_json::to_string(&results).unwrap();
        assert!(rendered.contains("debug"));
        assert!(rendered.contains("HIGH"));
    }

    #[test]
    fn text_export_get_appends_query_string() {
        let results = sample_results();
        let path = std::env::temp_dir().join("paramfinder_text_export_test.txt");
        let path_str = path.to_str().unwrap();
        let _ = std::fs::remove_file(&path);
        text_export(path_str, &results).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("example.test/?debug="));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn html_export_tags_risk_class() {
        let results = sample_results();
        let path = std::env::temp_dir().join("paramfinder_html_export_test.html");
        let path_str = path.to_str().unwrap();
        html_export(path_str, &results).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("risk-HIGH"));
        let _ = std::fs::remove_file(&path);
    }
}

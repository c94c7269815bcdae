//! Heuristic extraction of candidate parameter names from a baseline body
//! (spec §4.2, C4).
//!
//! Looks for `<input name=...>`, `<a href="?k=...">`, JSON object keys, and
//! `var x = ...` style assignments, case-folds and dedupes them, and keeps
//! only identifier-shaped tokens.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Identifier shape a candidate name must match (spec §4.2).
const NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_\-]{0,63}$";

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("valid regex"))
}

fn input_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<input[^>]*\bname\s*=\s*["']([^"']+)["']"#).expect("valid regex")
    })
}

fn href_query_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)href\s*=\s*["'][^"']*\?([^"'#]+)["']"#).expect("valid regex"))
}

fn json_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([A-Za-z_][A-Za-z0-9_\-]{0,63})"\s*:"#).expect("valid regex"))
}

fn var_assignment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:var|let|const)\s+([A-Za-z_][A-Za-z0-9_\-]{0,63})\s*=").expect("valid regex")
    })
}

fn push_if_identifier(out: &mut BTreeSet<String>, candidate: &str) {
    let folded = candidate.to_ascii_lowercase();
    if name_regex().is_match(&folded) {
        out.insert(folded);
    }
}

/// Extract candidate parameter names from a baseline response body
/// (spec §4.2 `extract(body) -> set<string>`).
#[must_use]
pub fn extract_candidates(body: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();

    for capture in input_name_regex().captures_iter(body) {
        push_if_identifier(&mut found, &capture[1]);
    }

    for capture in href_query_regex().captures_iter(body) {
        for pair in capture[1].split('&') {
            if let Some((key, _)) = pair.split_once('=') {
                push_if_identifier(&mut found, key);
            } else {
                push_if_identifier(&mut found, pair);
            }
        }
    }

    for capture in json_key_regex().captures_iter(body) {
        push_if_identifier(&mut found, &capture[1]);
    }

    for capture in var_assignment_regex().captures_iter(body) {
        push_if_identifier(&mut found, &capture[1]);
    }

    found
}

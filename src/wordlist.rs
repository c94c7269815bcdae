//! Wordlist loading, deduplication, and casing transforms (spec §6, §9
//! expansion item B2).
//!
//! Mirrors the original's `reader(..., mode='lines')` + `set(...)` plus
//! `arjun.plugins.wl.detect_casing` / `covert_to_case`, minus the `detect_casing`
//! delimiter-guessing step (the CLI here takes the target casing directly).

use std::collections::BTreeSet;
use std::path::Path;

/// Bundled wordlist content, embedded at compile time so `-w small|medium|large`
/// resolves without a filesystem lookup (spec §6 "Bundled files").
const SMALL: &str = include_str!("../db/small.txt");
const MEDIUM: &str = include_str!("../db/medium.txt");
const LARGE: &str = include_str!("../db/large.txt");

/// Special-case name -> fixed sentinel overrides merged into the populated
/// payload (spec §4.5 "merged set of `special` high-value names").
pub const SPECIAL_JSON: &str = include_str!("../db/special.json");

/// Target casing style for wordlist entries (spec §6 `--casing`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Casing {
    /// `like_this`.
    Snake,
    /// `likeThis`.
    Camel,
    /// `likethis`.
    Flat,
}

impl std::str::FromStr for Casing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snake_case" | "snake" => Ok(Self::Snake),
            "camelcase" | "camel" => Ok(Self::Camel),
            "flatcase" | "flat" => Ok(Self::Flat),
            other => Err(format!("unsupported casing style: {other}")),
        }
    }
}

/// Split a wordlist entry into its constituent words, tolerating
/// `snake_case`, `kebab-case`, and already-`camelCase` input.
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in name.chars() {
        if ch == '_' || ch == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(ch.to_ascii_lowercase());
        } else {
            current.push(ch.to_ascii_lowercase());
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Rewrite a single name into the requested casing (spec §6 `--casing`).
#[must_use]
pub fn apply_casing(name: &str, casing: Casing) -> String {
    let words = split_words(name);
    if words.is_empty() {
        return name.to_string();
    }
    match casing {
        Casing::Snake => words.join("_"),
        Casing::Flat => words.concat(),
        Casing::Camel => {
            let mut out = words[0].clone();
            for word in &words[1..] {
                let mut chars = word.chars();
                if let Some(first) = chars.next() {
                    out.push(first.to_ascii_uppercase());
                    out.push_str(chars.as_str());
                }
            }
            out
        }
    }
}

/// Resolve a `-w` flag value to its wordlist content: `small`/`medium`/`large`
/// resolve to the bundled lists, anything else is read from disk (spec §6).
pub fn load(path_or_alias: &str) -> std::io::Result<BTreeSet<String>> {
    let contents = match path_or_alias {
        "small" => SMALL.to_string(),
        "medium" => MEDIUM.to_string(),
        "large" => LARGE.to_string(),
        other => std::fs::read_to_string(Path::new(other))?,
    };
    Ok(parse_lines(&contents))
}

fn parse_lines(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Rewrite every entry of `wordlist` through `casing` (spec §6 `--casing`).
#[must_use]
pub fn recase(wordlist: &BTreeSet<String>, casing: Casing) -> BTreeSet<String> {
    wordlist.iter().map(|name| apply_casing(name, casing)).collect()
}

/// Parse the bundled `db/special.json` overrides map (spec §4.5 "Load
/// specials").
#[must_use]
pub fn load_specials() -> crate::request::Payload {
    serde_json::from_str(SPECIAL_JSON).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_aliases_resolve_to_nonempty_sets() {
        assert!(!load("small").unwrap().is_empty());
        assert!(!load("medium").unwrap().is_empty());
        assert!(!load("large").unwrap().is_empty());
    }

    #[test]
    fn parse_lines_dedupes_and_trims() {
        let parsed = parse_lines("a\nb\n a \n\nb\n");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains("a"));
        assert!(parsed.contains("b"));
    }

    #[test]
    fn casing_transforms_round_trip_words() {
        assert_eq!(apply_casing("page_token", Casing::Camel), "pageToken");
        assert_eq!(apply_casing("pageToken", Casing::Snake), "page_token");
        assert_eq!(apply_casing("page_token", Casing::Flat), "pagetoken");
    }

    #[test]
    fn specials_parse_as_a_payload_map() {
        let specials = load_specials();
        assert!(!specials.is_empty());
    }
}

//! Response fingerprinting (spec §3 "Response fingerprint F", §4.2 C2).

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use std::sync::OnceLock;

/// One named channel of a response fingerprint (GLOSSARY "Facet").
///
/// Ordering matches spec §4.4's stable comparison order: status, length,
/// tags, headers, body_words, reflections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Facet {
    /// HTTP status code.
    Status,
    /// Body byte length.
    Length,
    /// Structural tag/element histogram.
    Tags,
    /// Selected response headers.
    Headers,
    /// Multiset of body tokens.
    BodyWords,
    /// Sentinel values reflected verbatim in the body.
    Reflections,
}

impl Facet {
    /// All facets, in the stable comparison order used by the bruter.
    pub const ALL: [Self; 6] = [
        Self::Status,
        Self::Length,
        Self::Tags,
        Self::Headers,
        Self::BodyWords,
        Self::Reflections,
    ];
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Status => "status",
            Self::Length => "length",
            Self::Tags => "tags",
            Self::Headers => "headers",
            Self::BodyWords => "body_words",
            Self::Reflections => "reflections",
        };
        f.write_str(label)
    }
}

const TRACKED_HEADERS: [&str; 3] = ["content-type", "server", "content-length"];

/// A response fingerprint: the tuple of facet values described in spec §3.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fingerprint {
    /// HTTP status code.
    pub status: u16,
    /// Body byte length.
    pub length: usize,
    /// Multiset of body tokens (word -> count).
    pub body_words: BTreeMap<String, u32>,
    /// Structural tag/element histogram (tag name -> count).
    pub tags: BTreeMap<String, u32>,
    /// Selected response headers.
    pub headers: BTreeMap<String, String>,
    /// Sentinel values found verbatim in the body, should the caller have
    /// supplied the payload that produced this response.
    pub reflections: HashSet<String>,
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9_]{2,}").expect("valid regex"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<\s*([a-zA-Z][a-zA-Z0-9]*)").expect("valid regex"))
}

/// Compute the fingerprint of a response body/status/headers in one pass
/// (spec §4.2 `fingerprint(response) -> F`).
///
/// `payload` is the sentinel map that produced this response, used only to
/// populate the `reflections` facet; per spec §4.4, reflections must be
/// computed over *this request's* sentinel values, never the raw tag set,
/// so a reflected `User-Agent` or other ambient content never counts
/// (spec scenario S5).
#[must_use]
pub fn fingerprint(
    status: u16,
    body: &str,
    headers: &BTreeMap<String, String>,
    payload: &BTreeMap<String, String>,
) -> Fingerprint {
    let mut body_words = BTreeMap::new();
    for word in word_regex().find_iter(body) {
        *body_words
            .entry(word.as_str().to_ascii_lowercase())
            .or_insert(0u32) += 1;
    }

    let mut tags = BTreeMap::new();
    for capture in tag_regex().captures_iter(body) {
        let tag = capture[1].to_ascii_lowercase();
        *tags.entry(tag).or_insert(0u32) += 1;
    }

    let mut tracked_headers = BTreeMap::new();
    for name in TRACKED_HEADERS {
        if let Some(value) = headers.get(name) {
            tracked_headers.insert(name.to_string(), value.clone());
        }
    }

    let mut reflections = HashSet::new();
    for value in payload.values() {
        if !value.is_empty() && body.contains(value.as_str()) {
            reflections.insert(value.clone());
        }
    }

    Fingerprint {
        status,
        length: body.len(),
        body_words,
        tags,
        headers: tracked_headers,
        reflections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facets_compare_in_spec_order() {
        let mut facets = Facet::ALL.to_vec();
        facets.sort();
        assert_eq!(facets, Facet::ALL.to_vec());
    }

    #[test]
    fn fingerprint_counts_words_and_tags() {
        let headers = BTreeMap::new();
        let payload = BTreeMap::new();
        let fp = fingerprint(200, "<div>hello hello</div><span>world</span>", &headers, &payload);
        assert_eq!(fp.body_words.get("hello"), Some(&2));
        assert_eq!(fp.tags.get("div"), Some(&1));
        assert_eq!(fp.tags.get("span"), Some(&1));
    }

    #[test]
    fn reflections_only_match_this_payload_values() {
        let headers = BTreeMap::new();
        let mut payload = BTreeMap::new();
        payload.insert("q".to_string(), "zzneedle".to_string());
        let body = "some body containing zzneedle and Mozilla/5.0 the user agent";
        let fp = fingerprint(200, body, &headers, &payload);
        assert!(fp.reflections.contains("zzneedle"));
        assert_eq!(fp.reflections.len(), 1);
    }
}

//! The request template and payload types shared by every component.

use std::collections::BTreeMap;

use serde::Serialize;

/// An ordered `name -> sentinel value` mapping sent as a single probe.
///
/// Kept as a `BTreeMap` rather than a `HashMap` so serialization (JSON/XML
/// bodies, query strings) is deterministic given the same name set, which
/// matters for the reproducibility properties in spec §8.
pub type Payload = BTreeMap<String, String>;

/// Supported request shapes (spec §3 "Request template").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Parameters become URL query parameters.
    Get,
    /// Parameters become a URL-encoded form body.
    PostForm,
    /// Parameters become a JSON object body.
    PostJson,
    /// Parameters become an element-per-key XML fragment body.
    PostXml,
}

impl Method {
    /// The chunk-size default this method implies (spec §6: non-GET raises
    /// the default chunk size to 500).
    #[must_use]
    pub const fn default_chunk_size(self) -> usize {
        match self {
            Self::Get => 250,
            Self::PostForm | Self::PostJson | Self::PostXml => 500,
        }
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::PostForm),
            "JSON" => Ok(Self::PostJson),
            "XML" => Ok(Self::PostXml),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Get => "GET",
            Self::PostForm => "POST",
            Self::PostJson => "JSON",
            Self::PostXml => "XML",
        };
        f.write_str(label)
    }
}

impl Serialize for Method {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Body template used for `POST_JSON`/`POST_XML` requests, or a fixed
/// key/value map merged into every payload (spec §3 "include").
#[derive(Clone, Debug, Default)]
pub enum Include {
    /// No extra payload data.
    #[default]
    None,
    /// Fixed key/value pairs merged into every outgoing payload.
    Map(Payload),
    /// Raw body template containing the `$arjun$` placeholder, substituted
    /// with the serialized payload at send time.
    Template(String),
}

impl Include {
    /// Placeholder substituted with the serialized payload body.
    pub const PLACEHOLDER: &'static str = "$arjun$";

    /// The fixed map to merge into every payload, if any.
    #[must_use]
    pub fn as_map(&self) -> Option<&Payload> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The raw template string, if any.
    #[must_use]
    pub fn as_template(&self) -> Option<&str> {
        match self {
            Self::Template(template) => Some(template.as_str()),
            _ => None,
        }
    }
}

/// Immutable description of the endpoint under test (spec §3).
///
/// `url` may be normalized once during the stability probe at the start of
/// a run; every other field is fixed for the lifetime of the target.
#[derive(Clone, Debug)]
pub struct RequestTemplate {
    /// Target URL. May gain a trailing slash or scheme normalization during
    /// the initial stability probe, but the query/path otherwise stays put.
    pub url: String,
    /// Request method / body shape.
    pub method: Method,
    /// Headers merged into every outgoing request.
    pub headers: BTreeMap<String, String>,
    /// Fixed additions or a template merged into every payload.
    pub include: Include,
    /// Whether redirects must never be followed. Spec §4.1 says this is
    /// always applied regardless of the flag; the field is kept so the
    /// configured intent is observable and log-worthy.
    pub disable_redirects: bool,
}

impl RequestTemplate {
    /// Merge this template's fixed `include` map into a payload; templates
    /// are handled at serialization time in the transport, not here.
    #[must_use]
    pub fn merge_include(&self, mut payload: Payload) -> Payload {
        if let Some(map) = self.include.as_map() {
            for (key, value) in map {
                payload.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        payload
    }
}

/// Deterministic sentinel-value transform (spec §3 "Populate").
///
/// Produces `reverse(name)` prefixed with a fixed marker so reflected
/// sentinels are easy to locate in response bodies without colliding with
/// organic content.
#[must_use]
pub fn populate_value(name: &str) -> String {
    let reversed: String = name.chars().rev().collect();
    format!("zz{reversed}")
}

/// Build the sentinel-valued payload for a set of candidate names
/// (spec §4's `populate`).
#[must_use]
pub fn populate<'a, I>(names: I) -> Payload
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(|name| (name.to_string(), populate_value(name)))
        .collect()
}

/// Like [`populate`], but names present in `overrides` keep their fixed
/// sentinel value instead of the derived one (spec §4.5 "special" names
/// loaded from `db/special.json`).
#[must_use]
pub fn populate_with_overrides<'a, I>(names: I, overrides: &Payload) -> Payload
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(|name| match overrides.get(name) {
            Some(value) => (name.to_string(), value.clone()),
            None => (name.to_string(), populate_value(name)),
        })
        .collect()
}

/// Convert a flat payload into an element-per-key XML fragment
/// (spec §4.1 POST_XML).
#[must_use]
pub fn payload_to_xml(payload: &Payload) -> String {
    let mut out = String::new();
    for (key, value) in payload {
        out.push('<');
        out.push_str(key);
        out.push('>');
        out.push_str(&xml_escape(value));
        out.push_str("</");
        out.push_str(key);
        out.push('>');
    }
    out
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

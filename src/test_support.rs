//! In-memory mock [`Transport`] used across unit and scenario tests.
//!
//! The calibrator/bruter/narrower/scorer tests never need network access:
//! a closure over `(RequestTemplate, Payload) -> (status, body)` is enough.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::Rng;

use crate::context::TargetContext;
use crate::request::{Payload, RequestTemplate};
use crate::transport::{HttpResponse, Transport, TransportError};

type Responder = Box<dyn Fn(&RequestTemplate, &Payload) -> (u16, String) + Send + Sync>;

/// A scripted [`Transport`] whose response is computed by a closure, with
/// no network access at all.
pub struct ScriptedTransport {
    responder: Responder,
}

impl ScriptedTransport {
    /// Build a transport whose response is computed by `responder`.
    pub fn new(
        responder: impl Fn(&RequestTemplate, &Payload) -> (u16, String) + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
        }
    }

    /// Always returns the same status/body regardless of payload
    /// (spec scenario S1).
    #[must_use]
    pub fn constant(status: u16, body: String) -> Self {
        Self::new(move |_, _| (status, body.clone()))
    }

    /// Returns a fresh random body (and stable status) on every call, to
    /// exercise facet pruning during calibration (spec scenario S4).
    #[must_use]
    pub fn random_uuid_body() -> Self {
        Self::new(|_, _| (200, format!("token-{}", random_hex(16))))
    }

    /// Returns both a random status and a random body on every call, so no
    /// facet can ever stabilize (spec §4.3 "unstable page").
    #[must_use]
    pub fn fully_random() -> Self {
        Self::new(|_, _| {
            let status = if rand::thread_rng().gen_bool(0.5) {
                200
            } else {
                500
            };
            (status, random_hex(24))
        })
    }

    /// Inserts an HTML comment marker into the body iff the payload
    /// contains the given parameter name (spec scenario S2).
    #[must_use]
    pub fn reveals_on_param(name: &'static str) -> Self {
        Self::new(move |_, payload| {
            if payload.contains_key(name) {
                (200, format!("<html><!--{name}--></html>"))
            } else {
                (200, "<html>ok</html>".to_string())
            }
        })
    }

    /// Returns HTTP 500 iff `id` is present and its value contains a quote
    /// (spec scenario S3).
    #[must_use]
    pub fn sql_error_on_quoted_id() -> Self {
        Self::new(|_, payload| match payload.get("id") {
            Some(value) if value.contains('\'') => (500, "sql syntax error near '".to_string()),
            _ => (200, "ok".to_string()),
        })
    }

    /// Reflects every sentinel value verbatim in the body, as a real
    /// reflective endpoint would (used by reflection-probe tests).
    #[must_use]
    pub fn reflects_all() -> Self {
        Self::new(|_, payload| {
            let body = payload
                .values()
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            (200, format!("<html>{body}</html>"))
        })
    }
}

fn random_hex(len: usize) -> String {
    const CHARS: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        req: &RequestTemplate,
        payload: &Payload,
        ctx: &TargetContext,
    ) -> Result<HttpResponse, TransportError> {
        if ctx.kill.is_set() {
            return Err(TransportError::Killed);
        }
        let effective = req.merge_include(payload.clone());
        let (status, body) = (self.responder)(req, &effective);
        ctx.note_request();
        ctx.record_transport_success();
        Ok(HttpResponse {
            status,
            body,
            headers: BTreeMap::new(),
        })
    }
}

//! HTTP transport (spec §4.1, C1).
//!
//! Mirrors `arjun/core/requester.py`'s `requester()`: builds the final HTTP
//! message for the configured method, applies the waiting policy and rate
//! limit, rotates the `User-Agent`, never follows redirects, and maps any
//! transport failure to an `ErrorToken`-equivalent (here, a typed
//! [`TransportError`]) the caller treats as "no information" rather than a
//! hard failure (spec §7 "Propagation policy").

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method as ReqwestMethod};
use thiserror::Error;

use crate::context::{TargetContext, WaitPolicy};
use crate::request::{Include, Method, Payload, RequestTemplate, payload_to_xml};

/// A fetched response, reduced to what the fingerprinter needs.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, decoded as UTF-8 (lossily, since target encodings vary).
    pub body: String,
    /// Response headers, lower-cased names.
    pub headers: BTreeMap<String, String>,
}

/// Transport-level failure (spec §3 "ErrorToken").
#[derive(Debug, Error)]
pub enum TransportError {
    /// The target's cancellation flag was set before the request was sent.
    #[error("killed before send")]
    Killed,
    /// The underlying HTTP client failed (DNS, connect, TLS, timeout, ...).
    #[error("request failed: {0}")]
    Request(String),
    /// The request template could not be serialized (e.g. invalid URL).
    #[error("failed to build request: {0}")]
    Build(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Issues a single HTTP request for a request template + payload.
///
/// Implementations must never follow redirects and must honor the
/// configured waiting policy and rate limit. Kept as a trait so the
/// narrower/bruter/calibrator can be exercised against an in-memory mock
/// without any network access.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` against `req`, honoring `ctx`'s waiting policy, rate
    /// limit, and kill switch.
    async fn send(
        &self,
        req: &RequestTemplate,
        payload: &Payload,
        ctx: &TargetContext,
    ) -> Result<HttpResponse, TransportError>;
}

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1",
];

const DEFAULT_USER_AGENT_MARKER: &str = "paramfinder";

/// Rolling-window token bucket shared across every worker and every target
/// (spec §4.1 "global rate ceiling", §5 "Rate-limit state is shared").
struct RateLimiter {
    max_per_second: u32,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second,
            window: Mutex::new(VecDeque::new()),
        }
    }

    async fn acquire(&self) {
        if self.max_per_second == 0 {
            return;
        }
        loop {
            let wait = {
                let mut window = self.window.lock().expect("rate limiter mutex poisoned");
                let now = Instant::now();
                while window
                    .front()
                    .is_some_and(|oldest| now.duration_since(*oldest) >= Duration::from_secs(1))
                {
                    window.pop_front();
                }
                if window.len() < self.max_per_second as usize {
                    window.push_back(now);
                    None
                } else {
                    let oldest = *window.front().expect("window non-empty when at capacity");
                    Some(Duration::from_secs(1).saturating_sub(now.duration_since(oldest)))
                }
            };
            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

/// `reqwest`-backed [`Transport`] implementation.
pub struct ReqwestTransport {
    client: Client,
    limiter: RateLimiter,
}

impl ReqwestTransport {
    /// Build a new transport with the given timeout and rate ceiling. The
    /// client (and its connection pool) is meant to be shared across every
    /// target in a batch (spec §3 "Lifecycle").
    pub fn new(timeout: Duration, rate_limit: u32) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(DEFAULT_USER_AGENT_MARKER)
            .build()
            .map_err(|err| TransportError::Build(err.to_string()))?;
        Ok(Self {
            client,
            limiter: RateLimiter::new(rate_limit),
        })
    }

    async fn wait(&self, policy: WaitPolicy) {
        let duration = match policy {
            WaitPolicy::None => return,
            WaitPolicy::Fixed(duration) => duration,
            WaitPolicy::Stealth => {
                let millis = rand::thread_rng().gen_range(500..=2500);
                Duration::from_millis(millis)
            }
            WaitPolicy::Stable => {
                let secs = rand::thread_rng().gen_range(3..=10);
                Duration::from_secs(secs)
            }
        };
        tokio::time::sleep(duration).await;
    }
}

fn randomized_headers(base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut headers = base.clone();
    let needs_rotation = headers
        .get("User-Agent")
        .is_none_or(|ua| ua == DEFAULT_USER_AGENT_MARKER);
    if needs_rotation {
        let index = rand::thread_rng().gen_range(0..USER_AGENTS.len());
        headers.insert("User-Agent".to_string(), USER_AGENTS[index].to_string());
    }
    headers
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        req: &RequestTemplate,
        payload: &Payload,
        ctx: &TargetContext,
    ) -> Result<HttpResponse, TransportError> {
        if ctx.kill.is_set() {
            return Err(TransportError::Killed);
        }

        self.wait(ctx.config.wait_policy).await;
        self.limiter.acquire().await;

        if ctx.kill.is_set() {
            return Err(TransportError::Killed);
        }

        let effective = req.merge_include(payload.clone());
        let headers = randomized_headers(&req.headers);

        let result = self.dispatch(req, &effective, &headers).await;
        match &result {
            Ok(_) => ctx.record_transport_success(),
            Err(err) => {
                tracing::debug!(url = %req.url, error = %err, "transport error");
                ctx.record_transport_error();
            }
        }
        ctx.note_request();
        result
    }
}

impl ReqwestTransport {
    async fn dispatch(
        &self,
        req: &RequestTemplate,
        payload: &Payload,
        headers: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, TransportError> {
        let mut builder = match req.method {
            Method::Get => {
                let mut url = reqwest::Url::parse(&req.url)
                    .map_err(|err| TransportError::Build(err.to_string()))?;
                {
                    let mut pairs = url.query_pairs_mut();
                    for (key, value) in payload {
                        pairs.append_pair(key, value);
                    }
                }
                self.client.request(ReqwestMethod::GET, url)
            }
            Method::PostForm => self.client.post(&req.url).form(payload),
            Method::PostJson => {
                let body = build_json_body(req, payload);
                self.client
                    .post(&req.url)
                    .header("Content-Type", "application/json")
                    .body(body)
            }
            Method::PostXml => {
                let body = build_xml_body(req, payload);
                self.client
                    .post(&req.url)
                    .header("Content-Type", "application/xml")
                    .body(body)
            }
        };

        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let resp_headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            body,
            headers: resp_headers,
        })
    }
}

fn build_json_body(req: &RequestTemplate, payload: &Payload) -> String {
    let object = serde_json::to_value(payload).unwrap_or_default();
    match req.include.as_template() {
        Some(template) if template.contains(Include::PLACEHOLDER) => {
            let inner = serde_json::to_string(&object).unwrap_or_default();
            let inner = inner
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .unwrap_or(&inner)
                .to_string();
            template.replace(Include::PLACEHOLDER, &inner)
        }
        _ => serde_json::to_string(&object).unwrap_or_default(),
    }
}

fn build_xml_body(req: &RequestTemplate, payload: &Payload) -> String {
    let fragment = payload_to_xml(payload);
    match req.include.as_template() {
        Some(template) => template.replace(Include::PLACEHOLDER, &fragment),
        None => fragment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunConfig;
    use crate::request::Include;
    use httpmock::{Method::GET, Method::POST, MockServer};

    fn template(url: String, method: Method) -> RequestTemplate {
        RequestTemplate {
            url,
            method,
            headers: BTreeMap::new(),
            include: Include::None,
            disable_redirects: true,
        }
    }

    #[tokio::test]
    async fn get_request_merges_payload_into_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/").query_param("a", "1");
                then.status(200).body("ok");
            })
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5), 9999).unwrap();
        let ctx = TargetContext::new(RunConfig::default());
        let mut payload = Payload::new();
        payload.insert("a".to_string(), "1".to_string());

        let req = template(server.base_url(), Method::Get);
        let resp = transport.send(&req, &payload, &ctx).await.unwrap();
        mock.assert();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "ok");
    }

    #[tokio::test]
    async fn post_json_substitutes_placeholder_template() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).body("{}");
            })
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5), 9999).unwrap();
        let ctx = TargetContext::new(RunConfig::default());
        let mut payload = Payload::new();
        payload.insert("a".to_string(), "1".to_string());

        let mut req = template(server.base_url(), Method::PostJson);
        req.include = Include::Template(r#"{"wrapped":true,$arjun$}"#.to_string());
        transport.send(&req, &payload, &ctx).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn killed_before_send_returns_killed_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(5), 9999).unwrap();
        let ctx = TargetContext::new(RunConfig::default());
        ctx.kill.set();

        let req = template("http://127.0.0.1:1".to_string(), Method::Get);
        let result = transport.send(&req, &Payload::new(), &ctx).await;
        assert!(matches!(result, Err(TransportError::Killed)));
    }

    #[tokio::test]
    async fn connection_failure_maps_to_request_error_and_increments_streak() {
        let transport = ReqwestTransport::new(Duration::from_millis(200), 9999).unwrap();
        let mut config = RunConfig::default();
        config.error_streak_threshold = 1;
        let ctx = TargetContext::new(config);

        let req = template("http://127.0.0.1:1".to_string(), Method::Get);
        let result = transport.send(&req, &Payload::new(), &ctx).await;
        assert!(matches!(result, Err(TransportError::Request(_))));
        assert!(ctx.kill.is_set());
    }
}

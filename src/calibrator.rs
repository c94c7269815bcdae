//! Baseline calibration (spec §4.3, C3).
//!
//! Determines which fingerprint facets are stable enough to signal real
//! change, given two baseline probes plus a random-junk probe, with up to
//! ten refinement rounds against further junk probes.

use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;

use crate::context::TargetContext;
use crate::fingerprint::{Facet, Fingerprint, fingerprint};
use crate::request::{Payload, RequestTemplate, populate_value};
use crate::transport::{HttpResponse, Transport, TransportError};

/// Relative tolerance used when comparing `length` across baselines
/// (spec §4.3, `ε = 0.02` by default).
pub const LENGTH_TOLERANCE: f64 = 0.02;

/// Status codes that mark a response as "unhealthy" without aborting the
/// run (spec §4.3, §7).
const UNHEALTHY_STATUSES: [u16; 5] = [400, 413, 418, 429, 503];

/// Maximum refinement rounds against further junk probes (spec §4.3).
const REFINEMENT_ROUND_LIMIT: u32 = 10;

/// Outcome of a successful calibration.
#[derive(Debug)]
pub struct Calibration {
    /// The facets demonstrated stable (GLOSSARY "Significant-facet set").
    pub significant_facets: BTreeSet<Facet>,
    /// The first baseline fingerprint, used as the comparison anchor by the
    /// bruter.
    pub baseline: Fingerprint,
    /// Body of the first baseline probe, handed to the heuristic extractor
    /// (spec §4.4 "seed candidates from the baseline response").
    pub baseline_body: String,
    /// Whether the first probe returned an unhealthy status code.
    pub unhealthy: bool,
}

/// Calibration failed outright; the target must be skipped
/// (spec §4.3 "unstable page", §7).
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// A baseline probe failed at the transport level.
    #[error("baseline probe failed: {0}")]
    Transport(#[from] TransportError),
    /// Every facet was pruned away; the page is too noisy to fingerprint.
    #[error("page is unstable: no facet survived calibration")]
    Unstable,
}

fn random_junk_name() -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect();
    format!("z{suffix}")
}

fn single_probe_payload(name: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert(name.to_string(), populate_value(name));
    payload
}

async fn probe(
    transport: &dyn Transport,
    req: &RequestTemplate,
    ctx: &TargetContext,
    name: &str,
) -> Result<(HttpResponse, Fingerprint), TransportError> {
    let payload = single_probe_payload(name);
    let response = transport.send(req, &payload, ctx).await?;
    let fp = fingerprint(response.status, &response.body, &response.headers, &payload);
    Ok((response, fp))
}

fn facets_agree(a: &Fingerprint, b: &Fingerprint, facet: Facet) -> bool {
    match facet {
        Facet::Status => a.status == b.status,
        Facet::Length => {
            let max = a.length.max(b.length).max(1) as f64;
            let delta = (a.length as f64 - b.length as f64).abs();
            delta / max <= LENGTH_TOLERANCE
        }
        Facet::Tags => a.tags == b.tags,
        Facet::Headers => a.headers == b.headers,
        Facet::BodyWords => a.body_words == b.body_words,
        Facet::Reflections => a.reflections == b.reflections,
    }
}

/// Run calibration for a target (spec §4.3).
///
/// `_timeout` is accepted for symmetry with the transport's own timeout
/// handling; calibration itself does not impose an additional deadline.
pub async fn calibrate(
    transport: &dyn Transport,
    req: &RequestTemplate,
    ctx: &TargetContext,
    _timeout: Duration,
) -> Result<Calibration, CalibrationError> {
    let first_junk = random_junk_name();
    let (response_1, fp1) = probe(transport, req, ctx, &first_junk).await?;
    let unhealthy = UNHEALTHY_STATUSES.contains(&response_1.status);
    if unhealthy {
        tracing::warn!(status = response_1.status, "target returned an unhealthy status code");
    }

    let (_, fp2) = probe(transport, req, ctx, &first_junk).await?;

    let mut significant: BTreeSet<Facet> = Facet::ALL
        .into_iter()
        .filter(|facet| facets_agree(&fp1, &fp2, *facet))
        .collect();

    let mut rounds = 0;
    while rounds < REFINEMENT_ROUND_LIMIT {
        if significant.is_empty() {
            break;
        }
        let junk = random_junk_name();
        let (_, fp3) = probe(transport, req, ctx, &junk).await?;
        let disagreeing: Vec<Facet> = significant
            .iter()
            .copied()
            .filter(|facet| !facets_agree(&fp1, &fp3, *facet))
            .collect();
        if disagreeing.is_empty() {
            break;
        }
        for facet in disagreeing {
            significant.remove(&facet);
        }
        rounds += 1;
    }

    if significant.is_empty() {
        return Err(CalibrationError::Unstable);
    }

    Ok(Calibration {
        significant_facets: significant,
        baseline: fp1,
        baseline_body: response_1.body,
        unhealthy,
    })
}

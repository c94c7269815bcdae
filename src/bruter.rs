//! Chunk bruter (spec §4.4, C5).
//!
//! Sends a batch of candidate names as a single request and reports which
//! significant facet, if any, first diverges from the baseline.

use std::collections::BTreeSet;

use crate::calibrator::LENGTH_TOLERANCE;
use crate::context::TargetContext;
use crate::fingerprint::{Facet, Fingerprint, fingerprint};
use crate::request::{Payload, RequestTemplate, populate_with_overrides};
use crate::transport::{Transport, TransportError};

/// Mode a bruter call runs in (spec §4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BruteMode {
    /// Sending a chunk of candidate names to detect anomaly-carrying groups.
    Narrow,
    /// Sending a single name to confirm it independently
    /// (GLOSSARY "Verify mode").
    Verify,
}

fn diff_single_facet(baseline: &Fingerprint, candidate: &Fingerprint, facet: Facet) -> bool {
    match facet {
        Facet::Status => baseline.status != candidate.status,
        Facet::Length => {
            let max = baseline.length.max(candidate.length).max(1) as f64;
            let delta = (baseline.length as f64 - candidate.length as f64).abs();
            delta / max > LENGTH_TOLERANCE
        }
        Facet::Tags => baseline.tags != candidate.tags,
        Facet::Headers => baseline.headers != candidate.headers,
        Facet::BodyWords => baseline.body_words != candidate.body_words,
        // Reflections are special-cased in spec §4.4: only the sentinel
        // values belonging to *this* payload are compared, never the raw
        // set, so a baseline with zero reflections never looks "changed"
        // just because the candidate payload has sentinel values at all.
        Facet::Reflections => !candidate.reflections.is_empty(),
    }
}

/// Find the first significant facet (in spec's stable order) that diverges
/// between the baseline and a candidate fingerprint.
#[must_use]
pub fn diff(baseline: &Fingerprint, candidate: &Fingerprint, significant: &BTreeSet<Facet>) -> Option<Facet> {
    Facet::ALL
        .into_iter()
        .find(|facet| significant.contains(facet) && diff_single_facet(baseline, candidate, *facet))
}

/// Send a chunk of candidate names as one request and compare the
/// resulting fingerprint against the baseline (spec §4.4
/// `bruter(req_template, S, chunk) -> Diff | ⊥`).
///
/// `mode` records whether this call is bisecting a multi-name chunk or
/// independently re-confirming a singleton (GLOSSARY "Verify mode"); the
/// comparison itself is identical either way, but the distinction is
/// worth keeping in the trace for anyone reading request logs.
///
/// Returns `Ok(None)` for ⊥ (indistinguishable from baseline), `Ok(Some(facet))`
/// for a diff, and propagates transport errors so the caller can treat them
/// as "no information" per spec §7.
pub async fn bruter(
    transport: &dyn Transport,
    req: &RequestTemplate,
    ctx: &TargetContext,
    baseline: &Fingerprint,
    significant: &BTreeSet<Facet>,
    chunk: &[String],
    overrides: &Payload,
    mode: BruteMode,
) -> Result<Option<Facet>, TransportError> {
    let names: Vec<&str> = chunk.iter().map(String::as_str).collect();
    let payload = populate_with_overrides(names, overrides);
    let response = transport.send(req, &payload, ctx).await?;
    let candidate = fingerprint(response.status, &response.body, &response.headers, &payload);
    let result = diff(baseline, &candidate, significant);
    tracing::trace!(?mode, chunk_len = chunk.len(), diverged = result.is_some(), "bruter probe");
    Ok(result)
}

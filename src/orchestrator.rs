//! Per-target orchestration tying C1-C7 together (spec §2 "Flow", §3
//! "Lifecycle").
//!
//! Mirrors `arjun/core/engine.py`'s `initialize()`: calibrate a baseline,
//! augment the wordlist from heuristics and the bundled specials map,
//! partition and narrow, then confirm/score every surviving singleton.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::calibrator::{self, CalibrationError};
use crate::context::{RunConfig, TargetContext};
use crate::extractor;
use crate::narrower::{self, NarrowError};
use crate::request::{Payload, RequestTemplate};
use crate::scorer::{self, CandidateRecord};
use crate::transport::Transport;

/// Outcome classification for a single target (spec §7 taxonomy: a target
/// is either fully processed, found nothing, or was aborted).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetStatus {
    /// At least one parameter was confirmed.
    Found,
    /// Calibration and narrowing completed but nothing was confirmed.
    Empty,
    /// The target was aborted: unstable page, cancellation, or an error
    /// streak past the configured threshold.
    Skipped,
}

/// The result of running the full pipeline against one target.
#[derive(Debug)]
pub struct TargetResult {
    /// How the target's run concluded.
    pub status: TargetStatus,
    /// Confirmed, scored parameters (empty unless `status == Found`).
    pub params: Vec<CandidateRecord>,
}

impl TargetResult {
    fn skipped() -> Self {
        Self {
            status: TargetStatus::Skipped,
            params: Vec::new(),
        }
    }
}

/// Run the full parameter-discovery pipeline against one target URL
/// (spec §2 "Flow", §3 "Lifecycle": "create baseline -> calibrate ->
/// initial chunking -> narrowing rounds -> verification -> export").
pub async fn run_target(
    transport: Arc<dyn Transport>,
    req: Arc<RequestTemplate>,
    run_config: RunConfig,
    wordlist: &BTreeSet<String>,
    overrides: &Payload,
) -> TargetResult {
    let ctx = Arc::new(TargetContext::new(run_config));

    let calibration = match calibrator::calibrate(transport.as_ref(), req.as_ref(), ctx.as_ref(), ctx.config.timeout).await
    {
        Ok(calibration) => calibration,
        Err(CalibrationError::Unstable) => {
            tracing::warn!(url = %req.url, "page is unstable: no facet survived calibration");
            return TargetResult::skipped();
        }
        Err(CalibrationError::Transport(err)) => {
            tracing::warn!(url = %req.url, error = %err, "baseline probe failed");
            return TargetResult::skipped();
        }
    };

    let extracted = extractor::extract_candidates(&calibration.baseline_body);
    if !extracted.is_empty() {
        tracing::info!(count = extracted.len(), "extracted candidate parameters from baseline response");
    }

    let mut final_wordlist: BTreeSet<String> = wordlist.clone();
    final_wordlist.extend(extracted);
    final_wordlist.extend(overrides.keys().cloned());

    let baseline = Arc::new(calibration.baseline);
    let significant = Arc::new(calibration.significant_facets);
    let overrides = Arc::new(overrides.clone());

    let initial_chunks = narrower::partition(&final_wordlist, ctx.config.chunk_size);
    let outcome = match narrower::narrow(
        Arc::clone(&transport),
        Arc::clone(&req),
        Arc::clone(&ctx),
        Arc::clone(&baseline),
        Arc::clone(&significant),
        Arc::clone(&overrides),
        initial_chunks,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(NarrowError::Unstable) => {
            tracing::warn!(url = %req.url, "webpage returned different content on each request; skipping");
            return TargetResult::skipped();
        }
    };

    if outcome.killed {
        tracing::warn!(url = %req.url, "target cancelled mid-run");
        return TargetResult::skipped();
    }

    let semaphore = Arc::new(Semaphore::new(ctx.config.threads.max(1)));
    let mut tasks: JoinSet<Option<CandidateRecord>> = JoinSet::new();
    for name in outcome.last_params {
        let transport = Arc::clone(&transport);
        let req = Arc::clone(&req);
        let ctx = Arc::clone(&ctx);
        let baseline = Arc::clone(&baseline);
        let significant = Arc::clone(&significant);
        let overrides = Arc::clone(&overrides);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            scorer::confirm_and_score(
                transport.as_ref(),
                req.as_ref(),
                ctx.as_ref(),
                baseline.as_ref(),
                significant.as_ref(),
                &name,
                overrides.as_ref(),
            )
            .await
        });
    }

    let mut params = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Some(record) = joined.expect("verification worker task panicked") {
            params.push(record);
        }
    }
    params.sort_by(|a, b| a.name.cmp(&b.name));

    let status = if params.is_empty() {
        TargetStatus::Empty
    } else {
        TargetStatus::Found
    };
    TargetResult { status, params }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunConfig;
    use crate::request::{Include, Method};
    use crate::test_support::ScriptedTransport;
    use std::collections::BTreeMap;

    fn req() -> Arc<RequestTemplate> {
        Arc::new(RequestTemplate {
            url: "http://example.test/".to_string(),
            method: Method::Get,
            headers: BTreeMap::new(),
            include: Include::None,
            disable_redirects: true,
        })
    }

    fn wordlist(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn stable_constant_page_yields_empty_result() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::constant(200, "ok".to_string()));
        let result = run_target(transport, req(), RunConfig::default(), &wordlist(&["a", "b", "c"]), &Payload::new()).await;
        assert_eq!(result.status, TargetStatus::Empty);
        assert!(result.params.is_empty());
    }

    #[tokio::test]
    async fn trigger_name_is_found_and_scored() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::reveals_on_param("debug"));
        let mut config = RunConfig::default();
        config.chunk_size = 2;
        let result = run_target(transport, req(), config, &wordlist(&["a", "b", "debug", "c"]), &Payload::new()).await;
        assert_eq!(result.status, TargetStatus::Found);
        assert!(result.params.iter().any(|p| p.name == "debug"));
    }

    #[tokio::test]
    async fn fully_unstable_page_is_skipped() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::fully_random());
        let result = run_target(transport, req(), RunConfig::default(), &wordlist(&["a", "b"]), &Payload::new()).await;
        assert_eq!(result.status, TargetStatus::Skipped);
    }
}

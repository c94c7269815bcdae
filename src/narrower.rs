//! Recursive bisection of candidate chunks (spec §4.5, C6).
//!
//! Drives rounds of [`crate::bruter::bruter`] calls across a bounded worker
//! pool, halving any chunk that provokes an anomaly and discarding the
//! rest, until only singletons remain.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::bruter::{BruteMode, bruter};
use crate::context::TargetContext;
use crate::fingerprint::{Facet, Fingerprint, fingerprint};
use crate::request::{Payload, RequestTemplate, populate};
use crate::transport::{Transport, TransportError};

/// A group of candidate names sent together in one probe (GLOSSARY "Chunk").
pub type Chunk = Vec<String>;

/// Outcome of running the narrower to completion.
#[derive(Debug)]
pub struct NarrowOutcome {
    /// Singleton chunks that provoked an anomaly and survived to
    /// verification (spec's `last_params`).
    pub last_params: Vec<String>,
    /// Set when the target's kill switch fired mid-round.
    pub killed: bool,
}

/// The page became unacceptably noisy partway through narrowing
/// (spec §4.5 "instability guard").
#[derive(Debug, thiserror::Error)]
pub enum NarrowError {
    /// A post-round junk probe diverged after the chunk count grew.
    #[error("page became unstable during narrowing")]
    Unstable,
}

/// Partition a wordlist into equal-sized chunks, sorted for deterministic,
/// order-independent results (spec §8 "determinism modulo the input order").
#[must_use]
pub fn partition(wordlist: &BTreeSet<String>, chunk_size: usize) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);
    let sorted: Vec<String> = wordlist.iter().cloned().collect();
    sorted
        .chunks(chunk_size)
        .map(<[String]>::to_vec)
        .collect()
}

/// Halve a chunk lexicographically at the midpoint (spec §4.5
/// "Ordering & tie-breaks").
fn halve(chunk: &[String]) -> (Chunk, Chunk) {
    let mut sorted = chunk.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    let (left, right) = sorted.split_at(mid);
    (left.to_vec(), right.to_vec())
}

async fn junk_probe_diverges(
    transport: &dyn Transport,
    req: &RequestTemplate,
    ctx: &TargetContext,
    baseline: &Fingerprint,
    significant: &BTreeSet<Facet>,
) -> Result<bool, TransportError> {
    let junk_name = format!("zjunk{}", rand::random::<u16>());
    let payload = populate([junk_name.as_str()]);
    let response = transport.send(req, &payload, ctx).await?;
    let candidate = fingerprint(response.status, &response.body, &response.headers, &payload);
    Ok(crate::bruter::diff(baseline, &candidate, significant).is_some())
}

/// Drive the narrowing loop to completion (spec §4.5 "Round" + "Termination").
pub async fn narrow(
    transport: Arc<dyn Transport>,
    req: Arc<RequestTemplate>,
    ctx: Arc<TargetContext>,
    baseline: Arc<Fingerprint>,
    significant: Arc<BTreeSet<Facet>>,
    overrides: Arc<Payload>,
    initial_chunks: Vec<Chunk>,
) -> Result<NarrowOutcome, NarrowError> {
    let mut current = initial_chunks;
    let mut last_params = Vec::new();

    while !current.is_empty() {
        if ctx.kill.is_set() {
            return Ok(NarrowOutcome {
                last_params,
                killed: true,
            });
        }

        let prev_count = current.len();
        let semaphore = Arc::new(Semaphore::new(ctx.config.threads.max(1)));
        let mut tasks: JoinSet<(Chunk, Result<Option<Facet>, TransportError>)> = JoinSet::new();

        for chunk in current.drain(..) {
            let transport = Arc::clone(&transport);
            let req = Arc::clone(&req);
            let ctx = Arc::clone(&ctx);
            let baseline = Arc::clone(&baseline);
            let significant = Arc::clone(&significant);
            let overrides = Arc::clone(&overrides);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = bruter(
                    transport.as_ref(),
                    req.as_ref(),
                    ctx.as_ref(),
                    baseline.as_ref(),
                    significant.as_ref(),
                    &chunk,
                    overrides.as_ref(),
                    BruteMode::Narrow,
                )
                .await;
                (chunk, result)
            });
        }

        let mut next_round = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (chunk, result) = joined.expect("narrower worker task panicked");
            match result {
                Ok(Some(_facet)) => {
                    if chunk.len() == 1 {
                        last_params.push(chunk.into_iter().next().expect("singleton chunk"));
                    } else {
                        let (left, right) = halve(&chunk);
                        next_round.push(left);
                        next_round.push(right);
                    }
                }
                Ok(None) => {} // discarded: chunk provoked no anomaly.
                Err(TransportError::Killed) => {
                    return Ok(NarrowOutcome {
                        last_params,
                        killed: true,
                    });
                }
                Err(_) => {} // transport error: treated as "no information" (spec §7).
            }

            if ctx.kill.is_set() {
                return Ok(NarrowOutcome {
                    last_params,
                    killed: true,
                });
            }
        }

        if next_round.len() > prev_count {
            let diverges = junk_probe_diverges(
                transport.as_ref(),
                req.as_ref(),
                ctx.as_ref(),
                baseline.as_ref(),
                significant.as_ref(),
            )
            .await
            .unwrap_or(false);
            if diverges {
                return Err(NarrowError::Unstable);
            }
        }

        current = next_round;
    }

    Ok(NarrowOutcome {
        last_params,
        killed: false,
    })
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

    #[test]
    fn partition_is_sorted_and_chunked() {
        let words = wordlist(&["c", "a", "b", "d"]);
        let chunks = partition(&words, 2);
        assert_eq!(chunks, vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string(), "d".to_string()]]);
    }

    #[test]
    fn halve_splits_lexicographically() {
        let chunk = vec!["c".to_string(), "a".to_string(), "b".to_string(), "d".to_string()];
        let (left, right) = halve(&chunk);
        assert_eq!(left, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(right, vec!["c".to_string(), "d".to_string()]);
    }

    #[tokio::test]
    async fn no_signal_page_yields_no_candidates() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::constant(200, "ok".to_string()));
        let mut config = RunConfig::default();
        config.threads = 2;
        let ctx = Arc::new(TargetContext::new(config));
        let baseline = Arc::new(fingerprint(200, "ok", &BTreeMap::new(), &BTreeMap::new()));
        let significant: Arc<BTreeSet<Facet>> = Arc::new(Facet::ALL.into_iter().collect());

        let words = wordlist(&["a", "b", "c"]);
        let chunks = partition(&words, 2);
        let outcome = narrow(transport, req(), ctx, baseline, significant, Arc::new(Payload::new()), chunks)
            .await
            .unwrap();
        assert!(outcome.last_params.is_empty());
        assert!(!outcome.killed);
    }

    #[tokio::test]
    async fn trigger_name_survives_to_singleton() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::reveals_on_param("debug"));
        let ctx = Arc::new(TargetContext::new(RunConfig::default()));
        let baseline = Arc::new(fingerprint(200, "<html>ok</html>", &BTreeMap::new(), &BTreeMap::new()));
        let significant: Arc<BTreeSet<Facet>> = Arc::new(Facet::ALL.into_iter().collect());

        let words = wordlist(&["a", "b", "debug", "c"]);
        let chunks = partition(&words, 2);
        let outcome = narrow(transport, req(), ctx, baseline, significant, Arc::new(Payload::new()), chunks)
            .await
            .unwrap();
        assert_eq!(outcome.last_params, vec!["debug".to_string()]);
    }

    #[tokio::test]
    async fn kill_switch_stops_narrowing_early() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::reveals_on_param("debug"));
        let ctx = Arc::new(TargetContext::new(RunConfig::default()));
        ctx.kill.set();
        let baseline = Arc::new(fingerprint(200, "<html>ok</html>", &BTreeMap::new(), &BTreeMap::new()));
        let significant: Arc<BTreeSet<Facet>> = Arc::new(Facet::ALL.into_iter().collect());

        let words = wordlist(&["a", "debug"]);
        let chunks = partition(&words, 1);
        let outcome = narrow(transport, req(), ctx, baseline, significant, Arc::new(Payload::new()), chunks)
            .await
            .unwrap();
        assert!(outcome.killed);
        assert!(outcome.last_params.is_empty());
    }
}

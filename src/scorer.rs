//! Confirmer, scorer, and probe (spec §4.6, C7).

use std::collections::BTreeSet;

use crate::bruter::{BruteMode, bruter};
use crate::context::TargetContext;
use crate::fingerprint::{Facet, Fingerprint, fingerprint};
use crate::request::{Payload, RequestTemplate};
use crate::transport::Transport;

const HIGH_VALUE_KEYWORDS: [&str; 10] = [
    "id", "user", "admin", "debug", "file", "path", "redirect", "url", "cmd", "exec",
];
const MEDIUM_VALUE_KEYWORDS: [&str; 7] = ["page", "view", "sort", "order", "key", "token", "auth"];

const REFLECTION_PAYLOAD: &str = "ArjunTest<>\"'";
const SQLI_PAYLOAD: &str = "'";

/// Risk classification band (spec §4.6 "Risk bands").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Risk {
    /// Score below 30.
    Low,
    /// Score in `[30, 50)`.
    Medium,
    /// Score in `[50, 80)`.
    High,
    /// Score `>= 80`.
    Critical,
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Map a numeric score to its risk band (spec §4.6). Bands are monotone in
/// score by construction (spec §8 invariant 5).
#[must_use]
pub fn risk_for_score(score: u32) -> Risk {
    if score >= 80 {
        Risk::Critical
    } else if score >= 50 {
        Risk::High
    } else if score >= 30 {
        Risk::Medium
    } else {
        Risk::Low
    }
}

/// Pure name/behavior-based scoring function (spec §4.6 step 2, §8
/// invariant 4: "Scoring is a pure function of name and boolean probe
/// outcomes").
#[must_use]
pub fn score_name(name: &str, reflected: bool, sql_error: bool) -> u32 {
    let lower = name.to_ascii_lowercase();
    let mut score = 10u32;

    if HIGH_VALUE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        score += 40;
    } else if MEDIUM_VALUE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        score += 20;
    }

    if reflected {
        score += 50;
    }
    if sql_error {
        score += 30;
    }

    score
}

/// A confirmed, scored, and probed parameter (spec §3 "Candidate record").
#[derive(Clone, Debug)]
pub struct CandidateRecord {
    /// The discovered parameter name.
    pub name: String,
    /// Which facet discriminated it during narrowing/verification.
    pub reason: Facet,
    /// Numeric risk score.
    pub score: u32,
    /// Risk band derived from `score`.
    pub risk: Risk,
    /// Tags describing lightweight probe findings.
    pub findings: Vec<String>,
}

/// Reflection probe (spec §4.6 step 3): send a literal XSS-shaped sentinel
/// and check whether the body echoes it verbatim.
pub async fn probe_reflection(
    transport: &dyn Transport,
    req: &RequestTemplate,
    ctx: &TargetContext,
    name: &str,
) -> bool {
    let mut payload = Payload::new();
    payload.insert(name.to_string(), REFLECTION_PAYLOAD.to_string());
    match transport.send(req, &payload, ctx).await {
        Ok(response) => response.body.contains(REFLECTION_PAYLOAD),
        Err(_) => false,
    }
}

/// SQL-error probe (spec §4.6 step 3): send a bare quote and check for
/// telltale error text.
pub async fn probe_sql_error(
    transport: &dyn Transport,
    req: &RequestTemplate,
    ctx: &TargetContext,
    name: &str,
) -> bool {
    let mut payload = Payload::new();
    payload.insert(name.to_string(), SQLI_PAYLOAD.to_string());
    match transport.send(req, &payload, ctx).await {
        Ok(response) => {
            let lowered = response.body.to_ascii_lowercase();
            lowered.contains("syntax error") || lowered.contains("sql")
        }
        Err(_) => false,
    }
}

/// Confirm, score, and probe one singleton candidate
/// (spec §4.6 steps 1-3).
///
/// Re-verification (the bisection diff, in isolation) is the primary
/// confirmation path, but a singleton that stops diverging on its own
/// sentinel can still be confirmed by the reflection/SQL-error probes
/// firing directly — a parameter that throws a SQL error or reflects a
/// literal sentinel is proven real regardless of whether the derived
/// bisection payload happened to carry a triggering value. Returns `None`
/// only when none of the three signals fire.
pub async fn confirm_and_score(
    transport: &dyn Transport,
    req: &RequestTemplate,
    ctx: &TargetContext,
    baseline: &Fingerprint,
    significant: &BTreeSet<Facet>,
    name: &str,
    overrides: &Payload,
) -> Option<CandidateRecord> {
    let chunk = vec![name.to_string()];
    let bruter_reason = bruter(transport, req, ctx, baseline, significant, &chunk, overrides, BruteMode::Verify)
        .await
        .ok()
        .flatten();

    let reflected = probe_reflection(transport, req, ctx, name).await;
    let sql_error = probe_sql_error(transport, req, ctx, name).await;

    let reason = bruter_reason.or_else(|| {
        if sql_error {
            Some(Facet::BodyWords)
        } else if reflected {
            Some(Facet::Reflections)
        } else {
            None
        }
    })?;

    let mut findings = Vec::new();
    if reflected {
        findings.push("Reflected Input (Potential XSS)".to_string());
    }
    if sql_error {
        findings.push("SQL Error Triggered".to_string());
    }

    let score = score_name(name, reflected, sql_error);
    let risk = risk_for_score(score);

    Some(CandidateRecord {
        name: name.to_string(),
        reason,
        score,
        risk,
        findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunConfig;
    use crate::request::{Include, Method};
    use crate::test_support::ScriptedTransport;
    use std::collections::BTreeMap;

    fn req() -> RequestTemplate {
        RequestTemplate {
            url: "http://example.test/".to_string(),
            method: Method::Get,
            headers: BTreeMap::new(),
            include: Include::None,
            disable_redirects: true,
        }
    }

    fn all_facets() -> BTreeSet<Facet> {
        Facet::ALL.into_iter().collect()
    }

    #[test]
    fn scoring_is_pure_and_deterministic() {
        assert_eq!(score_name("id", false, false), 50);
        assert_eq!(score_name("id", false, false), score_name("id", false, false));
        assert_eq!(score_name("page", false, false), 30);
        assert_eq!(score_name("mystery", false, false), 10);
        assert_eq!(score_name("mystery", true, true), 90);
    }

    #[test]
    fn risk_bands_are_monotone_in_score() {
        let scores = [0u32, 10, 29, 30, 49, 50, 79, 80, 120];
        let risks: Vec<Risk> = scores.iter().map(|s| risk_for_score(*s)).collect();
        for window in risks.windows(2) {
            assert!(window[0] <= window[1]);
        }
    }

    #[tokio::test]
    async fn sql_error_probe_flags_quote_triggered_errors() {
        let transport = ScriptedTransport::sql_error_on_quoted_id();
        let ctx = TargetContext::new(RunConfig::default());
        let triggered = probe_sql_error(&transport, &req(), &ctx, "id").await;
        assert!(triggered);
    }

    #[tokio::test]
    async fn reflection_probe_flags_literal_echo() {
        let transport = ScriptedTransport::reflects_all();
        let ctx = TargetContext::new(RunConfig::default());
        let reflected = probe_reflection(&transport, &req(), &ctx, "q").await;
        assert!(reflected);
    }

    #[tokio::test]
    async fn confirm_and_score_builds_full_record_for_sql_injectable_param() {
        let transport = ScriptedTransport::sql_error_on_quoted_id();
        let ctx = TargetContext::new(RunConfig::default());
        let baseline = fingerprint(200, "ok", &BTreeMap::new(), &BTreeMap::new());
        let significant = all_facets();

        let record = confirm_and_score(&transport, &req(), &ctx, &baseline, &significant, "id", &Payload::new())
            .await
            .expect("id should confirm");
        assert_eq!(record.name, "id");
        assert!(record.findings.contains(&"SQL Error Triggered".to_string()));
        assert!(record.risk >= Risk::High);
    }

    #[tokio::test]
    async fn confirm_and_score_returns_none_when_verification_fails() {
        let transport = ScriptedTransport::constant(200, "ok".to_string());
        let ctx = TargetContext::new(RunConfig::default());
        let baseline = fingerprint(200, "ok", &BTreeMap::new(), &BTreeMap::new());
        let significant = all_facets();

        let record = confirm_and_score(&transport, &req(), &ctx, &baseline, &significant, "ghost", &Payload::new()).await;
        assert!(record.is_none());
    }
}

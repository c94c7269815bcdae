//! Per-run and per-target context (spec §9 "Process-wide state").
//!
//! The original keeps configuration and the cancellation flag as
//! process-wide mutable globals (`arjun.core.config.var`). Here everything
//! is threaded explicitly: [`RunConfig`] holds settings resolved once from
//! the CLI, and [`TargetContext`] bundles the pieces that are scoped to a
//! single target URL (its own kill switch, consecutive-error counter, and
//! chunk/thread sizing) so no state leaks between targets (spec §5 "Shared
//! resources").

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// Waiting policy applied before each outgoing request (spec §4.1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WaitPolicy {
    /// No extra delay beyond the rate limiter.
    None,
    /// Fixed per-request delay.
    Fixed(Duration),
    /// `--stealth`: short random jitter in `[0.5, 2.5]` seconds.
    Stealth,
    /// `--stable`: long random delay in `[3, 10]` seconds, forces pool size 1.
    Stable,
}

/// Settings resolved once from CLI flags, shared read-only across targets
/// (spec §9: "pass a per-run context value explicitly to every component").
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Worker pool size (forced to 1 under `--stable` or a nonzero `--delay`).
    pub threads: usize,
    /// Initial chunk size, already clamped against the wordlist length.
    pub chunk_size: usize,
    /// Request timeout.
    pub timeout: Duration,
    /// Requests-per-second ceiling shared by every worker.
    pub rate_limit: u32,
    /// Waiting policy applied before every request.
    pub wait_policy: WaitPolicy,
    /// Consecutive transport-error streak that raises `kill` (spec §5, default 20).
    pub error_streak_threshold: u32,
    /// Maximum total requests per target before the run aborts as a safety
    /// valve (spec §3 invariant 4).
    pub max_requests_per_target: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: 5,
            chunk_size: 250,
            timeout: Duration::from_secs(15),
            rate_limit: 9999,
            wait_policy: WaitPolicy::None,
            error_streak_threshold: 20,
            max_requests_per_target: 200_000,
        }
    }
}

/// Cooperative cancellation flag observed at every request and round
/// boundary (GLOSSARY "Kill").
#[derive(Clone, Default)]
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
    /// Construct a fresh, unset kill switch.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Per-target state: a fresh instance is created for every target URL and
/// torn down once the target completes (spec §3 "Lifecycle").
pub struct TargetContext {
    /// Run-wide settings, shared read-only.
    pub config: RunConfig,
    /// This target's cancellation flag.
    pub kill: KillSwitch,
    /// Consecutive transport-error counter (spec §5, §7).
    error_streak: AtomicU32,
    /// Total requests issued against this target so far.
    requests_issued: AtomicU32,
}

impl TargetContext {
    /// Construct a fresh per-target context from shared run settings.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            kill: KillSwitch::new(),
            error_streak: AtomicU32::new(0),
            requests_issued: AtomicU32::new(0),
        }
    }

    /// Record a transport error; raises `kill` once the configured streak
    /// is exceeded (spec §5, §7).
    pub fn record_transport_error(&self) {
        let streak = self.error_streak.fetch_add(1, Ordering::SeqCst) + 1;
        if streak > self.config.error_streak_threshold {
            tracing::warn!(
                streak,
                threshold = self.config.error_streak_threshold,
                "consecutive transport error streak exceeded; raising kill"
            );
            self.kill.set();
        }
    }

    /// Reset the consecutive-error counter after a successful response.
    pub fn record_transport_success(&self) {
        self.error_streak.store(0, Ordering::SeqCst);
    }

    /// Increment and return the running request count for this target,
    /// raising `kill` once the configured budget is exhausted (spec §3
    /// invariant 4).
    pub fn note_request(&self) -> u32 {
        let count = self.requests_issued.fetch_add(1, Ordering::SeqCst) + 1;
        if self.budget_exhausted() {
            tracing::warn!(
                count,
                max = self.config.max_requests_per_target,
                "request budget exhausted; raising kill"
            );
            self.kill.set();
        }
        count
    }

    /// Whether the target's request budget has been exhausted
    /// (spec §3 invariant 4).
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        u64::from(self.requests_issued.load(Ordering::SeqCst)) >= self.config.max_requests_per_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_switch_reports_set_state() {
        let kill = KillSwitch::new();
        assert!(!kill.is_set());
        kill.set();
        assert!(kill.is_set());
    }

    #[test]
    fn error_streak_raises_kill_past_threshold() {
        let mut config = RunConfig::default();
        config.error_streak_threshold = 2;
        let ctx = TargetContext::new(config);
        ctx.record_transport_error();
        assert!(!ctx.kill.is_set());
        ctx.record_transport_error();
        assert!(!ctx.kill.is_set());
        ctx.record_transport_error();
        assert!(ctx.kill.is_set());
    }

    #[test]
    fn exhausting_request_budget_raises_kill() {
        let mut config = RunConfig::default();
        config.max_requests_per_target = 2;
        let ctx = TargetContext::new(config);
        ctx.note_request();
        assert!(!ctx.kill.is_set());
        assert!(!ctx.budget_exhausted());
        ctx.note_request();
        assert!(ctx.kill.is_set());
        assert!(ctx.budget_exhausted());
    }

    #[test]
    fn success_resets_error_streak() {
        let mut config = RunConfig::default();
        config.error_streak_threshold = 2;
        let ctx = TargetContext::new(config);
        ctx.record_transport_error();
        ctx.record_transport_error();
        ctx.record_transport_success();
        ctx.record_transport_error();
        assert!(!ctx.kill.is_set());
    }
}

// Error classification and retry backoff.
//
// Platform and provider errors arrive as anyhow chains whose concrete
// types belong to other crates, so classification pattern-matches the
// error's textual representation (status codes and keyword families),
// the same way the HTTP layer reports them. Each category carries a
// severity and a remediation hint for the operator; the engine itself
// only acts on RateLimited and ServerError.
//
// Backoff state is scoped per context string ("poll", "analyze",
// "remove-action", ...) so a throttled removal endpoint never inflates
// the delay applied to an unrelated operation.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;

/// How loudly an error should be surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

/// Failure taxonomy for platform and provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    PermissionDenied,
    ResourceNotFound,
    RateLimited,
    NetworkConnectivity,
    SslCertificate,
    AuthenticationFailed,
    ServerError,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::PermissionDenied => "PERMISSION_DENIED",
            ErrorCategory::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCategory::RateLimited => "RATE_LIMITED",
            ErrorCategory::NetworkConnectivity => "NETWORK_CONNECTIVITY",
            ErrorCategory::SslCertificate => "SSL_CERTIFICATE",
            ErrorCategory::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorCategory::ServerError => "SERVER_ERROR",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorCategory::PermissionDenied
            | ErrorCategory::SslCertificate
            | ErrorCategory::AuthenticationFailed
            | ErrorCategory::NetworkConnectivity => Severity::High,
            _ => Severity::Medium,
        }
    }

    /// Operator-facing hint. Informational only — nothing here is
    /// actionable by the engine itself.
    pub fn remediation(&self) -> &'static str {
        match self {
            ErrorCategory::PermissionDenied => {
                "Verify the bot account is a moderator of the target subreddit and is not restricted"
            }
            ErrorCategory::ResourceNotFound => {
                "Verify the subreddit name and that the resource exists and is accessible"
            }
            ErrorCategory::RateLimited => {
                "Reduce API call frequency; backoff has been applied automatically"
            }
            ErrorCategory::NetworkConnectivity => {
                "Check the internet connection, DNS resolution, and firewall/proxy settings"
            }
            ErrorCategory::SslCertificate => {
                "Check the system clock and update SSL certificates; corporate TLS inspection can also cause this"
            }
            ErrorCategory::AuthenticationFailed => {
                "Verify the API credentials; regenerate them if they may have expired"
            }
            ErrorCategory::ServerError => {
                "Platform-side issue; the engine retries with backoff. Check the platform status page if it persists"
            }
            ErrorCategory::Unknown => {
                "Review the full error message; enable debug logging for more detail"
            }
        }
    }
}

/// Classify an error by its textual description.
///
/// Checks walk the whole anyhow chain via the Debug representation, so a
/// "HTTP 429" buried under two layers of context still classifies as
/// rate limiting. First matching family wins.
pub fn classify(error: &anyhow::Error) -> ErrorCategory {
    let text = format!("{error:?}").to_lowercase();
    classify_str(&text)
}

fn classify_str(text: &str) -> ErrorCategory {
    let contains_any =
        |needles: &[&str]| -> bool { needles.iter().any(|needle| text.contains(needle)) };

    if contains_any(&["permission", "forbidden", "403"]) {
        ErrorCategory::PermissionDenied
    } else if contains_any(&["not found", "404", "does not exist"]) {
        ErrorCategory::ResourceNotFound
    } else if contains_any(&[
        "rate limit",
        "ratelimit",
        "429",
        "too many",
        "quota exceeded",
        "throttled",
    ]) {
        ErrorCategory::RateLimited
    } else if contains_any(&["timeout", "timed out", "connection", "network", "dns"]) {
        ErrorCategory::NetworkConnectivity
    } else if contains_any(&["ssl", "certificate", "tls"]) {
        ErrorCategory::SslCertificate
    } else if contains_any(&["authentication", "unauthorized", "401", "invalid_grant", "token"]) {
        ErrorCategory::AuthenticationFailed
    } else if contains_any(&["500", "502", "503", "internal server error", "bad gateway"]) {
        ErrorCategory::ServerError
    } else {
        ErrorCategory::Unknown
    }
}

/// Per-context rate-limit backoff state.
#[derive(Debug, Default)]
struct ContextBackoff {
    /// Consecutive rate-limit failures in this context.
    consecutive_failures: u32,
    /// Slow-moving multiplier, capped at 3.
    level: u32,
    /// All-time count, for operator statistics.
    total: u64,
}

/// Registry of rate-limit backoff state keyed by context.
///
/// Delay formula: `min(base * 2^(n-1) * level, cap)` where `n` is the
/// consecutive-failure count (capped at 5) and `level` grows one step
/// per failure up to 3. Up to 10% random jitter is added before the cap
/// so synchronized clients don't retry in lockstep.
pub struct BackoffRegistry {
    base: Duration,
    cap: Duration,
    contexts: HashMap<String, ContextBackoff>,
}

impl BackoffRegistry {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            contexts: HashMap::new(),
        }
    }

    /// Defaults matching the engine's operational profile: 1 minute base,
    /// 10 minute ceiling.
    pub fn with_defaults() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(600))
    }

    /// Record a rate-limit failure in `context` and return how long the
    /// caller should back off before the next attempt.
    pub fn on_rate_limited(&mut self, context: &str) -> Duration {
        let state = self.contexts.entry(context.to_string()).or_default();
        state.consecutive_failures += 1;
        state.level = (state.level + 1).min(3);
        state.total += 1;

        let exponent = state.consecutive_failures.min(5) - 1;
        let raw = self.base.as_secs_f64() * 2f64.powi(exponent as i32) * state.level as f64;

        let jitter = rand::rng().random_range(0.0..=0.1);
        let jittered = raw * (1.0 + jitter);

        Duration::from_secs_f64(jittered.min(self.cap.as_secs_f64()))
    }

    /// An operation in `context` succeeded — the streak is over.
    pub fn on_success(&mut self, context: &str) {
        if let Some(state) = self.contexts.get_mut(context) {
            state.consecutive_failures = 0;
            state.level = 0;
        }
    }

    /// A non-rate-limit error also breaks the streak.
    pub fn on_other_error(&mut self, context: &str) {
        self.on_success(context);
    }

    /// Consecutive failure count for a context (0 if never seen).
    pub fn consecutive_failures(&self, context: &str) -> u32 {
        self.contexts
            .get(context)
            .map(|s| s.consecutive_failures)
            .unwrap_or(0)
    }

    /// All-time rate-limit count for a context.
    pub fn total_for(&self, context: &str) -> u64 {
        self.contexts.get(context).map(|s| s.total).unwrap_or(0)
    }
}

/// Linear backoff for 5xx responses on the fetch path.
///
/// Server errors during an outage arrive in runs; exponential growth
/// would overshoot badly once the platform recovers. Delay grows by a
/// fixed increment per attempt, the attempt counter is clamped once it
/// passes 10, and every successful fetch decays it by one so a long
/// outage doesn't inflate delays forever after service resumes.
pub struct ServerErrorBackoff {
    attempts: u32,
    base: Duration,
    increment: Duration,
}

impl Default for ServerErrorBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(3))
    }
}

impl ServerErrorBackoff {
    pub fn new(base: Duration, increment: Duration) -> Self {
        Self {
            attempts: 0,
            base,
            increment,
        }
    }

    /// Record a server error and return the delay before the next fetch.
    pub fn on_server_error(&mut self) -> Duration {
        let delay = self.base + self.increment * self.attempts;
        self.attempts += 1;
        if self.attempts > 10 {
            self.attempts = 5;
        }
        delay
    }

    /// A fetch succeeded; decay the attempt counter.
    pub fn on_success(&mut self) {
        self.attempts = self.attempts.saturating_sub(1);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    // ── classify ────────────────────────────────────────────────────

    #[test]
    fn classifies_permission_errors() {
        assert_eq!(
            classify(&anyhow!("HTTP 403 Forbidden")),
            ErrorCategory::PermissionDenied
        );
        assert_eq!(
            classify(&anyhow!("permission denied for wiki edit")),
            ErrorCategory::PermissionDenied
        );
    }

    #[test]
    fn classifies_rate_limit_variants() {
        for msg in [
            "HTTP 429 Too Many Requests",
            "rate limit exceeded",
            "RateLimit hit",
            "quota exceeded for model",
            "request throttled",
        ] {
            assert_eq!(
                classify(&anyhow!("{msg}")),
                ErrorCategory::RateLimited,
                "{msg}"
            );
        }
    }

    #[test]
    fn classifies_server_errors() {
        assert_eq!(
            classify(&anyhow!("HTTP 500 Internal Server Error")),
            ErrorCategory::ServerError
        );
        assert_eq!(classify(&anyhow!("502 Bad Gateway")), ErrorCategory::ServerError);
        assert_eq!(classify(&anyhow!("503 unavailable")), ErrorCategory::ServerError);
    }

    #[test]
    fn classifies_network_and_ssl() {
        assert_eq!(
            classify(&anyhow!("connection refused")),
            ErrorCategory::NetworkConnectivity
        );
        assert_eq!(
            classify(&anyhow!("operation timed out")),
            ErrorCategory::NetworkConnectivity
        );
        assert_eq!(
            classify(&anyhow!("certificate verify failed")),
            ErrorCategory::SslCertificate
        );
    }

    #[test]
    fn classifies_through_context_chain() {
        let inner = anyhow!("HTTP 429");
        let outer = inner.context("Failed to list comments");
        assert_eq!(classify(&outer), ErrorCategory::RateLimited);
    }

    #[test]
    fn unknown_when_nothing_matches() {
        assert_eq!(classify(&anyhow!("flux capacitor misaligned")), ErrorCategory::Unknown);
        assert_eq!(classify(&anyhow!("")), ErrorCategory::Unknown);
    }

    #[test]
    fn not_fooled_by_similar_status_codes() {
        assert_eq!(classify(&anyhow!("HTTP 428")), ErrorCategory::Unknown);
        assert_eq!(classify(&anyhow!("HTTP 430")), ErrorCategory::Unknown);
    }

    #[test]
    fn every_category_has_a_remediation_hint() {
        for category in [
            ErrorCategory::PermissionDenied,
            ErrorCategory::ResourceNotFound,
            ErrorCategory::RateLimited,
            ErrorCategory::NetworkConnectivity,
            ErrorCategory::SslCertificate,
            ErrorCategory::AuthenticationFailed,
            ErrorCategory::ServerError,
            ErrorCategory::Unknown,
        ] {
            assert!(!category.remediation().is_empty());
            assert!(!category.as_str().is_empty());
        }
    }

    // ── BackoffRegistry ─────────────────────────────────────────────

    #[test]
    fn consecutive_rate_limits_produce_strictly_increasing_delays() {
        let mut registry = BackoffRegistry::with_defaults();

        let d1 = registry.on_rate_limited("poll");
        let d2 = registry.on_rate_limited("poll");
        let d3 = registry.on_rate_limited("poll");

        assert!(d2 > d1, "expected {d2:?} > {d1:?}");
        assert!(d3 > d2, "expected {d3:?} > {d2:?}");
        for d in [d1, d2, d3] {
            assert!(d <= Duration::from_secs(600), "delay {d:?} exceeds the cap");
        }
    }

    #[test]
    fn delay_is_capped() {
        let mut registry = BackoffRegistry::with_defaults();
        for _ in 0..10 {
            let d = registry.on_rate_limited("poll");
            assert!(d <= Duration::from_secs(600));
        }
    }

    #[test]
    fn success_resets_the_streak() {
        let mut registry = BackoffRegistry::with_defaults();
        registry.on_rate_limited("poll");
        registry.on_rate_limited("poll");
        assert_eq!(registry.consecutive_failures("poll"), 2);

        registry.on_success("poll");
        assert_eq!(registry.consecutive_failures("poll"), 0);

        // The next failure starts from the base delay again
        let d = registry.on_rate_limited("poll");
        assert!(d <= Duration::from_secs(66), "post-reset delay {d:?} should be near base");
    }

    #[test]
    fn other_errors_also_reset_the_streak() {
        let mut registry = BackoffRegistry::with_defaults();
        registry.on_rate_limited("poll");
        registry.on_other_error("poll");
        assert_eq!(registry.consecutive_failures("poll"), 0);
    }

    #[test]
    fn contexts_are_independent() {
        let mut registry = BackoffRegistry::with_defaults();
        registry.on_rate_limited("poll");
        registry.on_rate_limited("poll");
        registry.on_rate_limited("poll");

        // A fresh context starts from the base delay, unaffected by the
        // "poll" streak
        assert_eq!(registry.consecutive_failures("remove-action"), 0);
        let d = registry.on_rate_limited("remove-action");
        assert!(d <= Duration::from_secs(66), "fresh context delay {d:?} should be near base");
    }

    #[test]
    fn total_counts_survive_resets() {
        let mut registry = BackoffRegistry::with_defaults();
        registry.on_rate_limited("poll");
        registry.on_success("poll");
        registry.on_rate_limited("poll");
        assert_eq!(registry.total_for("poll"), 2);
    }

    // ── ServerErrorBackoff ──────────────────────────────────────────

    #[test]
    fn server_backoff_grows_linearly() {
        let mut backoff = ServerErrorBackoff::default();
        assert_eq!(backoff.on_server_error(), Duration::from_secs(5));
        assert_eq!(backoff.on_server_error(), Duration::from_secs(8));
        assert_eq!(backoff.on_server_error(), Duration::from_secs(11));
    }

    #[test]
    fn server_backoff_attempts_are_clamped() {
        let mut backoff = ServerErrorBackoff::default();
        for _ in 0..11 {
            backoff.on_server_error();
        }
        // The counter reset to a moderate level rather than growing forever
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn server_backoff_decays_on_success() {
        let mut backoff = ServerErrorBackoff::default();
        backoff.on_server_error();
        backoff.on_server_error();
        assert_eq!(backoff.attempts(), 2);

        backoff.on_success();
        assert_eq!(backoff.attempts(), 1);
        backoff.on_success();
        backoff.on_success();
        assert_eq!(backoff.attempts(), 0);
    }
}

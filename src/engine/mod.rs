// Moderation orchestrator — the poll → fetch → analyze → act cycle.
//
// A single worker drives the whole engine: fetch new comments since the
// persisted cursor, gate each analysis call through the rate limiter,
// classify via the configured LLM, act on the verdict, feed the
// transparency ledger, then sleep for the adaptive delay. Transient
// failures are classified and handled inside the loop; the loop itself
// never dies to one. Suspension points (rate-limiter waits, backoff
// sleeps, the inter-cycle sleep) are the only blocking points, and all
// long sleeps are chunked so a pause or stop lands within about a second.

pub mod backoff;
pub mod delay;
pub mod prompt;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::{Config, ProviderBackend};
use crate::decision::{DecisionParser, Verdict};
use crate::ledger::TransparencyLedger;
use crate::notify::{Event, Notifier};
use crate::output;
use crate::provider::create_provider;
use crate::provider::traits::{LlmProvider, TokenUsage};
use crate::reddit::client::{Comment, Platform};
use crate::reddit::rate_limit::RateLimiter;
use crate::store::{StateStore, Statistics, TokenTotals};

use backoff::{classify, BackoffRegistry, ErrorCategory, ServerErrorBackoff};
use delay::AdaptiveDelay;

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
}

impl BotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotState::Stopped => "STOPPED",
            BotState::Starting => "STARTING",
            BotState::Running => "RUNNING",
            BotState::Paused => "PAUSED",
            BotState::Stopping => "STOPPING",
        }
    }
}

/// Shared control flags. The worker checks these at the top of every
/// loop iteration and inside chunked sleeps; an external holder (CLI
/// signal handler, observer UI) flips them.
#[derive(Default)]
pub struct Control {
    stop_requested: AtomicBool,
    paused: AtomicBool,
}

impl Control {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// What one poll cycle did, for logging and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleOutcome {
    pub fetched: usize,
    pub analyzed: usize,
    pub removed: usize,
}

/// The moderation engine. Owns all mutable engine state; collaborators
/// (platform, provider, observer) are reached through their seams.
pub struct Moderator {
    config: Config,
    platform: Arc<dyn Platform>,
    provider: Box<dyn LlmProvider>,
    parser: DecisionParser,
    rate_limiter: RateLimiter,
    delay: AdaptiveDelay,
    backoff: BackoffRegistry,
    fetch_backoff: ServerErrorBackoff,
    ledger: TransparencyLedger,
    store: StateStore,
    stats: Statistics,
    token_totals: TokenTotals,
    notifier: Notifier,
    control: Arc<Control>,
    state: BotState,
}

impl Moderator {
    /// Assemble the engine. Loads persisted state; does not touch the
    /// network — that's `start`'s job.
    pub fn new(
        config: Config,
        platform: Arc<dyn Platform>,
        provider: Box<dyn LlmProvider>,
        notifier: Notifier,
    ) -> Result<Self> {
        let store = StateStore::new(&config.data_dir)?;
        let stats = store.load_statistics();
        let token_totals = store.load_token_totals();

        let ledger = TransparencyLedger::new(
            config.ledger_enabled,
            config.ledger_page_name.clone(),
            config.ledger_publish_threshold,
            config.ledger_publish_interval,
            &config.data_dir,
        )?;

        let rate_limiter = RateLimiter::new(
            config.max_requests_per_minute,
            config.min_request_delay,
            config.max_request_delay,
        );

        let delay = AdaptiveDelay::new(
            config.adaptive_base_interval,
            config.adaptive_increase_percentage,
            config.adaptive_max_delay,
        );

        Ok(Self {
            config,
            platform,
            provider,
            parser: DecisionParser::new(),
            rate_limiter,
            delay,
            backoff: BackoffRegistry::with_defaults(),
            fetch_backoff: ServerErrorBackoff::default(),
            ledger,
            store,
            stats,
            token_totals,
            notifier,
            control: Control::new(),
            state: BotState::Stopped,
        })
    }

    /// Handle for pausing/resuming/stopping the engine from outside.
    pub fn control(&self) -> Arc<Control> {
        Arc::clone(&self.control)
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn set_safe_mode(&mut self, safe_mode: bool) {
        self.config.safe_mode = safe_mode;
        info!(safe_mode = safe_mode, "Safe mode updated");
        self.notifier
            .log(format!("Safe mode: {}", if safe_mode { "ON" } else { "OFF" }));
    }

    /// Swap the LLM backend at runtime.
    ///
    /// The new provider is constructed and health-checked before it
    /// replaces the old one; on any failure the previous provider stays
    /// active and the switch reports the error.
    pub async fn switch_provider(&mut self, backend: ProviderBackend) -> Result<()> {
        let mut candidate_config = self.config.clone();
        candidate_config.provider_backend = backend;

        let candidate = create_provider(&candidate_config)
            .with_context(|| format!("Failed to construct {} provider", backend.as_str()))?;
        candidate
            .check_health()
            .await
            .with_context(|| format!("{} failed its health check", backend.as_str()))?;

        self.provider = candidate;
        self.config = candidate_config;
        info!(provider = backend.as_str(), "LLM provider switched");
        self.notifier
            .log(format!("LLM provider changed to {}", backend.as_str()));
        Ok(())
    }

    /// STARTING: validate configuration and establish the platform
    /// connection. Any failure lands back in STOPPED.
    pub async fn start(&mut self) -> Result<()> {
        self.set_state(BotState::Starting);

        let startup = async {
            self.config.require_reddit()?;
            self.config.require_provider()?;
            prompt::validate_prompt()?;

            // One cheap listing call proves credentials and subreddit access
            self.platform
                .list_comments_since(Some(Utc::now()))
                .await
                .context("Failed to establish the platform connection")?;

            self.provider
                .check_health()
                .await
                .with_context(|| format!("{} failed its health check", self.provider.name()))?;

            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = startup {
            self.set_state(BotState::Stopped);
            return Err(e);
        }

        info!(
            subreddit = %self.config.subreddit,
            provider = self.provider.name(),
            safe_mode = self.config.safe_mode,
            "Moderation engine started"
        );
        Ok(())
    }

    /// The main loop. Runs until a stop is requested, then finishes the
    /// in-flight unit of work and returns.
    pub async fn run(&mut self) -> Result<()> {
        self.set_state(BotState::Running);

        while !self.control.is_stop_requested() {
            if self.control.is_paused() {
                if self.state != BotState::Paused {
                    self.set_state(BotState::Paused);
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
            if self.state == BotState::Paused {
                // Resuming exactly where we left off: cursor and delay
                // state were frozen, not reset
                self.set_state(BotState::Running);
            }

            self.poll_cycle().await;

            if self.control.is_stop_requested() {
                break;
            }

            let status = self.delay.status();
            if status.at_base {
                info!(
                    delay_secs = status.current.as_secs_f64(),
                    "Next check at base interval"
                );
            } else {
                info!(
                    delay_secs = status.current.as_secs_f64(),
                    empty_cycles = status.consecutive_empty,
                    "Next check on adaptive delay"
                );
            }

            self.interruptible_sleep(status.current).await;
        }

        self.set_state(BotState::Stopping);
        self.set_state(BotState::Stopped);
        info!("Moderation engine stopped");
        Ok(())
    }

    /// One poll cycle: fetch, filter, analyze, act, advance the cursor.
    ///
    /// The cursor advances only after the whole cycle completes; a fetch
    /// failure or a mid-cycle stop leaves it where it was, so those
    /// comments are seen again on the next cycle.
    pub async fn poll_cycle(&mut self) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();

        let cursor = self.store.load_cursor();
        let cycle_start = Utc::now();

        match cursor {
            Some(ts) => info!(since = %ts, "Checking for new comments"),
            None => info!("First run — checking the most recent comments"),
        }

        let fetched = self.platform.list_comments_since(cursor).await;
        let comments = match fetched {
            Ok(comments) => {
                self.fetch_backoff.on_success();
                self.backoff.on_success("poll");
                comments
            }
            Err(e) => {
                self.handle_fetch_error(e).await;
                return outcome;
            }
        };

        outcome.fetched = comments.len();

        if comments.is_empty() {
            self.delay.on_activity(0);
            // Quiet periods at max delay would otherwise spam the log
            if self.delay.is_at_base() {
                info!("Found 0 new comments");
            }
        } else {
            self.delay.on_activity(comments.len());
            info!(count = comments.len(), "Found new comments to analyze");

            for comment in &comments {
                if self.control.is_stop_requested() {
                    info!("Stop requested — aborting comment processing");
                    return outcome;
                }
                self.rate_limiter.wait_if_needed().await;
                let (analyzed, removed) = self.analyze_and_moderate(comment).await;
                outcome.analyzed += analyzed as usize;
                outcome.removed += removed as usize;
            }
        }

        if let Err(e) = self.store.save_cursor(cycle_start) {
            error!(error = %e, "Failed to persist the poll cursor");
        }

        outcome
    }

    /// Analyze one comment and act on the verdict.
    /// Returns (analyzed, removed) for cycle accounting.
    async fn analyze_and_moderate(&mut self, comment: &Comment) -> (bool, bool) {
        // Filters that never cost an API call
        if comment.body == "[deleted]" || comment.body == "[removed]" {
            return (false, false);
        }
        if comment.author == self.config.reddit_username {
            return (false, false);
        }
        if self.config.mod_allowlist.iter().any(|m| m == &comment.author) {
            info!(author = %comment.author, "Skipping allow-listed moderator account");
            return (false, false);
        }

        info!(comment_id = %comment.id, author = %comment.author, "Analyzing comment");

        if self.control.is_stop_requested() {
            info!("Stop requested — skipping comment analysis");
            return (false, false);
        }

        let analysis = self
            .provider
            .analyze(prompt::MODERATION_PROMPT, &comment.body)
            .await;
        let response = match analysis {
            Ok((text, usage)) => {
                self.backoff.on_success("analyze");
                self.record_usage(usage);
                Some(text)
            }
            Err(e) => {
                self.handle_classified_error(&e, "analyze").await;
                None
            }
        };

        let verdict = match &response {
            Some(text) => {
                info!(
                    comment_id = %comment.id,
                    response = %output::truncate_chars(&output::clean_text(text), 500),
                    "LLM reasoning"
                );
                self.parser.parse(text)
            }
            None => Verdict::Unknown,
        };

        self.notifier.notify(Event::CommentAnalyzed {
            comment_id: comment.id.clone(),
            verdict,
        });

        match verdict {
            Verdict::Remove if self.config.safe_mode => {
                output::print_decision(
                    "WOULD REMOVE",
                    "- violates community rules [SAFE MODE]",
                    &comment.body,
                    &comment.permalink,
                );
                warn!(
                    comment_id = %comment.id,
                    author = %comment.author,
                    "WOULD REMOVE (safe mode) — no action taken"
                );
                self.notifier.notify(Event::WouldRemove {
                    comment_id: comment.id.clone(),
                });
            }
            Verdict::Remove => {
                output::print_decision(
                    "REMOVE",
                    "- violates community rules",
                    &comment.body,
                    &comment.permalink,
                );

                let removal = self.platform.remove_comment(&comment.id).await;
                match removal {
                    Ok(()) => {
                        self.backoff.on_success("remove-action");
                        warn!(
                            comment_id = %comment.id,
                            author = %comment.author,
                            "MODERATION: removed comment"
                        );
                        self.ledger
                            .append(
                                self.platform.as_ref(),
                                &comment.body,
                                &comment.id,
                                &comment.permalink,
                                "violates community rules",
                            )
                            .await;
                        self.stats.comments_removed += 1;
                        self.notifier.notify(Event::CommentRemoved {
                            comment_id: comment.id.clone(),
                            permalink: comment.permalink.clone(),
                        });
                        self.finish_analysis();
                        return (true, true);
                    }
                    Err(e) => {
                        error!(comment_id = %comment.id, "Failed to remove comment");
                        self.handle_classified_error(&e, "remove-action").await;
                    }
                }
            }
            Verdict::Keep => {
                info!(comment_id = %comment.id, "Decision: KEEP — does not violate rules");
                self.notifier.notify(Event::CommentApproved {
                    comment_id: comment.id.clone(),
                });
            }
            Verdict::Unknown => {
                info!(
                    comment_id = %comment.id,
                    "Decision: SKIPPED — no usable verdict from analysis"
                );
            }
        }

        self.finish_analysis();
        (true, false)
    }

    /// Per-comment bookkeeping shared by every verdict path.
    fn finish_analysis(&mut self) {
        self.stats.comments_analyzed += 1;
        self.persist_stats();
        output::print_divider();
    }

    /// Classify a fetch failure and apply the category's backoff policy.
    async fn handle_fetch_error(&mut self, error: anyhow::Error) {
        let category = classify(&error);
        self.log_classified(&error, category, "poll");

        match category {
            ErrorCategory::ServerError => {
                let delay = self.fetch_backoff.on_server_error();
                warn!(
                    delay_secs = delay.as_secs_f64(),
                    attempt = self.fetch_backoff.attempts(),
                    "Server error on fetch path — backing off"
                );
                self.interruptible_sleep(delay).await;
            }
            ErrorCategory::RateLimited => {
                let delay = self.backoff.on_rate_limited("poll");
                warn!(
                    delay_secs = delay.as_secs_f64(),
                    consecutive = self.backoff.consecutive_failures("poll"),
                    "Rate limited on fetch path — backing off"
                );
                self.notifier.notify(Event::RateLimitHit {
                    context: "poll".to_string(),
                    delay,
                });
                self.interruptible_sleep(delay).await;
            }
            _ => {
                // Abandon the cycle; the next scheduled poll retries on
                // the adaptive cadence
                self.backoff.on_other_error("poll");
            }
        }
    }

    /// Classify a non-fetch failure and update that context's backoff.
    async fn handle_classified_error(&mut self, error: &anyhow::Error, context: &str) {
        let category = classify(error);
        self.log_classified(error, category, context);

        if category == ErrorCategory::RateLimited {
            let delay = self.backoff.on_rate_limited(context);
            warn!(
                context = context,
                delay_secs = delay.as_secs_f64(),
                "Rate limited — backing off"
            );
            self.notifier.notify(Event::RateLimitHit {
                context: context.to_string(),
                delay,
            });
            self.interruptible_sleep(delay).await;
        } else {
            self.backoff.on_other_error(context);
        }
    }

    fn log_classified(&self, error: &anyhow::Error, category: ErrorCategory, context: &str) {
        error!(
            context = context,
            category = category.as_str(),
            severity = category.severity().as_str(),
            remediation = category.remediation(),
            "{error:#}"
        );
        self.notifier.log(format!(
            "[{}] {} error in {}: {error:#}",
            category.severity().as_str(),
            category.as_str(),
            context
        ));
    }

    /// Accumulate token usage into the process-wide totals and persist.
    fn record_usage(&mut self, usage: TokenUsage) {
        self.token_totals.total_input_tokens += usage.input_tokens;
        self.token_totals.total_output_tokens += usage.output_tokens;
        self.token_totals.total_cost += usage.estimated_cost;
        self.token_totals.last_updated = Some(Utc::now());
        if let Err(e) = self.store.save_token_totals(&self.token_totals) {
            warn!(error = %e, "Failed to persist token totals");
        }
    }

    fn persist_stats(&mut self) {
        self.stats.refresh_rate();
        self.stats.last_updated = Some(Utc::now());
        if let Err(e) = self.store.save_statistics(&self.stats) {
            warn!(error = %e, "Failed to persist statistics");
        }
    }

    fn set_state(&mut self, state: BotState) {
        self.state = state;
        self.notifier.notify(Event::Status(state.as_str()));
    }

    /// Sleep in ≤1s chunks so pause/stop requests take effect within
    /// roughly a second instead of after a full adaptive delay.
    async fn interruptible_sleep(&self, total: Duration) {
        let mut remaining = total;
        while remaining > Duration::ZERO {
            if self.control.is_stop_requested() || self.control.is_paused() {
                return;
            }
            let chunk = remaining.min(Duration::from_secs(1));
            tokio::time::sleep(chunk).await;
            remaining = remaining.saturating_sub(chunk);
        }
    }
}

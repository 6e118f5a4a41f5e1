// Transparency ledger — durable, append-only record of removals.
//
// Every live removal is recorded locally before the action is considered
// complete, and the accumulated record is periodically published to a
// subreddit wiki page so moderation can be audited from outside the
// bot. Publication is threshold-driven: once enough unpublished entries
// accumulate, the next append triggers an automatic wiki update. A
// failed publish leaves all local state untouched — the counter stays
// put and the next append simply tries again.
//
// The ledger is the sole writer of its two state files.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::reddit::client::Platform;
use crate::store::StateStore;

pub const LEDGER_FILE: &str = "wiki_data.json";
pub const COUNTER_FILE: &str = "removal_counter.json";

/// One removed comment, recorded in full. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub comment_full_text: String,
    pub comment_id: String,
    pub permalink: String,
    pub removal_reason: String,
    pub context_url: String,
}

/// The persisted ledger: ordered entries plus bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerData {
    pub entries: Vec<LedgerEntry>,
    pub removal_count: u64,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_manual_update: Option<DateTime<Utc>>,
}

/// Unpublished-entry counter, persisted separately so a crash between
/// append and publish can't lose track of pending entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishCounter {
    pub count: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Snapshot for status output.
#[derive(Debug, Clone)]
pub struct LedgerStatus {
    pub enabled: bool,
    pub total_entries: usize,
    pub removal_count: u64,
    pub unpublished: u32,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_manual_update: Option<DateTime<Utc>>,
}

pub struct TransparencyLedger {
    enabled: bool,
    page_name: String,
    publish_threshold: u32,
    /// Minimum spacing between automatic publishes. Manual publishes
    /// bypass this.
    publish_interval: Duration,
    store: StateStore,
    data: LedgerData,
    counter: u32,
    last_publish: Option<Instant>,
}

impl TransparencyLedger {
    pub fn new(
        enabled: bool,
        page_name: String,
        publish_threshold: u32,
        publish_interval: Duration,
        data_dir: &Path,
    ) -> Result<Self> {
        let store = StateStore::new(data_dir)?;
        let data: LedgerData = store.load_json(LEDGER_FILE);
        let counter: PublishCounter = store.load_json(COUNTER_FILE);

        info!(
            enabled = enabled,
            entries = data.entries.len(),
            unpublished = counter.count,
            "Transparency ledger initialized"
        );

        Ok(Self {
            enabled,
            page_name,
            publish_threshold: publish_threshold.max(1),
            publish_interval,
            store,
            data,
            counter: counter.count,
            last_publish: None,
        })
    }

    /// Record a removal. Returns false when the ledger is disabled or
    /// the entry could not be persisted; the caller treats false as
    /// "the removal happened but is not on the public record".
    ///
    /// Reaching the publish threshold triggers an automatic publish
    /// attempt; on failure the counter is left intact so the next
    /// append retries.
    pub async fn append(
        &mut self,
        platform: &dyn Platform,
        comment_text: &str,
        comment_id: &str,
        permalink: &str,
        reason: &str,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let absolute = if permalink.starts_with("http") {
            permalink.to_string()
        } else {
            format!("https://reddit.com{permalink}")
        };

        let entry = LedgerEntry {
            timestamp: Utc::now(),
            comment_full_text: comment_text.to_string(),
            comment_id: comment_id.to_string(),
            permalink: absolute.clone(),
            removal_reason: reason.to_string(),
            context_url: format!("{absolute}?context=3"),
        };

        self.data.entries.push(entry);
        self.data.removal_count += 1;
        self.counter += 1;

        // Durability before success: if either file fails to persist,
        // roll the in-memory state back and report failure.
        if let Err(e) = self.persist() {
            error!(error = %e, "Failed to persist ledger entry");
            self.data.entries.pop();
            self.data.removal_count -= 1;
            self.counter -= 1;
            return false;
        }

        info!(comment_id = comment_id, "Recorded removal in transparency ledger");

        if self.counter >= self.publish_threshold {
            info!(
                unpublished = self.counter,
                threshold = self.publish_threshold,
                "Publish threshold reached"
            );
            if self.publish(platform, false).await {
                self.counter = 0;
                if let Err(e) = self.persist_counter() {
                    error!(error = %e, "Failed to persist publish counter reset");
                }
            }
        }

        true
    }

    /// Render the full entry set and write it to the wiki page.
    ///
    /// Automatic publishes are spaced by `publish_interval`; a manual
    /// publish bypasses that guard. A failed publish changes nothing
    /// locally.
    pub async fn publish(&mut self, platform: &dyn Platform, manual: bool) -> bool {
        if !self.enabled {
            warn!("Transparency ledger is disabled");
            return false;
        }

        if !manual {
            if let Some(last) = self.last_publish {
                let elapsed = last.elapsed();
                if elapsed < self.publish_interval {
                    warn!(
                        remaining_secs = (self.publish_interval - elapsed).as_secs(),
                        "Publish rate limit active, skipping automatic update"
                    );
                    return false;
                }
            }
        }

        let content = self.format_report();

        if let Err(e) = platform.publish_page(&self.page_name, &content).await {
            error!(error = %e, page = %self.page_name, "Wiki publish failed");
            return false;
        }

        let now = Utc::now();
        self.data.last_updated = Some(now);
        if manual {
            self.data.last_manual_update = Some(now);
        }
        if let Err(e) = self.persist_data() {
            error!(error = %e, "Failed to persist ledger after publish");
        }
        self.last_publish = Some(Instant::now());

        info!(
            page = %self.page_name,
            entries = self.data.entries.len(),
            kind = if manual { "manual" } else { "automatic" },
            "Wiki publish successful"
        );
        true
    }

    /// Render the wiki page content, newest entry first.
    pub fn format_report(&self) -> String {
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let mut content = String::from("# Removed Comments\n\n");

        if self.data.entries.is_empty() {
            content.push_str("No comments have been removed yet.\n\n---\n\n");
            content.push_str(&format!("**Last Updated:** {now}\n"));
            return content;
        }

        content.push_str(&format!("**Total Removed:** {}\n", self.data.removal_count));
        content.push_str(&format!("**Last Updated:** {now}\n\n---\n\n"));

        let mut sorted: Vec<&LedgerEntry> = self.data.entries.iter().collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        for (i, entry) in sorted.iter().enumerate() {
            let removed_at = entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC");
            content.push_str(&format!("## Removed Comment #{}\n", i + 1));
            content.push_str(&format!("**Removed:** {removed_at}\n"));
            content.push_str(&format!("**Reason:** {}\n", entry.removal_reason));
            content.push_str(&format!("**Context:** [View Thread]({})\n\n", entry.context_url));
            content.push_str("**Comment Text:**\n```\n");
            content.push_str(&entry.comment_full_text);
            content.push_str("\n```\n\n---\n\n");
        }

        content
    }

    pub fn status(&self) -> LedgerStatus {
        LedgerStatus {
            enabled: self.enabled,
            total_entries: self.data.entries.len(),
            removal_count: self.data.removal_count,
            unpublished: self.counter,
            last_updated: self.data.last_updated,
            last_manual_update: self.data.last_manual_update,
        }
    }

    /// Administrative reset. Not reachable from the processing path —
    /// only the CLI's clear-ledger command calls this.
    pub fn clear(&mut self) -> Result<()> {
        self.data = LedgerData::default();
        self.counter = 0;
        self.persist()?;
        info!("Transparency ledger cleared");
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.persist_data()?;
        self.persist_counter()
    }

    fn persist_data(&self) -> Result<()> {
        self.store.save_json(LEDGER_FILE, &self.data)
    }

    fn persist_counter(&self) -> Result<()> {
        self.store.save_json(
            COUNTER_FILE,
            &PublishCounter {
                count: self.counter,
                last_updated: Some(Utc::now()),
            },
        )
    }
}

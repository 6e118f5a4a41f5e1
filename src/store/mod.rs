// Durable engine state — one JSON file per concern under the data dir.
//
// Every file tolerates being absent (first run) or malformed (fall back
// to the default, log, keep going); state files are never a reason to
// refuse to start. Writes go to a temp file in the same directory and
// are renamed into place, so a crash mid-write can't corrupt state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CURSOR_FILE: &str = "last_check.json";
pub const TOKEN_USAGE_FILE: &str = "token_usage.json";
pub const STATISTICS_FILE: &str = "statistics.json";

/// The durable marker of how far the comment stream has been processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorFile {
    pub last_check: DateTime<Utc>,
}

/// Process-lifetime running totals of provider token consumption.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenTotals {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Cumulative moderation statistics, persisted across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub comments_analyzed: u64,
    pub comments_removed: u64,
    #[serde(default)]
    pub removal_rate: String,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Statistics {
    /// Recompute the derived rate string before persisting.
    pub fn refresh_rate(&mut self) {
        self.removal_rate = if self.comments_analyzed > 0 {
            format!(
                "{:.2}%",
                self.comments_removed as f64 / self.comments_analyzed as f64 * 100.0
            )
        } else {
            "0%".to_string()
        };
    }
}

/// Handle on the data directory. Each component is the sole writer of
/// its own file; the store only provides the mechanics.
pub struct StateStore {
    data_dir: PathBuf,
}

impl StateStore {
    /// Open (and create if needed) the data directory.
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Load a JSON state file, falling back to the default when the file
    /// is absent or unreadable. A malformed file is logged and replaced
    /// by the default on the next save — never a hard failure.
    pub fn load_json<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.path(name);
        if !path.exists() {
            return T::default();
        }
        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!(file = name, error = %e, "State file is malformed, using defaults");
                    T::default()
                }
            },
            Err(e) => {
                warn!(file = name, error = %e, "Failed to read state file, using defaults");
                T::default()
            }
        }
    }

    /// Persist a JSON state file atomically (write temp, then rename).
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path(name);
        let tmp = self.path(&format!("{name}.tmp"));

        let raw = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {name}"))?;
        fs::write(&tmp, raw).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Read the poll cursor, if one has been persisted.
    pub fn load_cursor(&self) -> Option<DateTime<Utc>> {
        if !self.path(CURSOR_FILE).exists() {
            return None;
        }
        let file: Option<CursorFile> = match fs::read_to_string(self.path(CURSOR_FILE)) {
            Ok(raw) => serde_json::from_str(&raw).ok(),
            Err(_) => None,
        };
        if file.is_none() {
            warn!(file = CURSOR_FILE, "Cursor file unreadable, treating as first run");
        }
        file.map(|f| f.last_check)
    }

    /// Advance the poll cursor. The cursor is monotonically non-decreasing:
    /// an older timestamp than the persisted one is ignored.
    pub fn save_cursor(&self, timestamp: DateTime<Utc>) -> Result<()> {
        if let Some(existing) = self.load_cursor() {
            if timestamp < existing {
                warn!(
                    requested = %timestamp,
                    existing = %existing,
                    "Refusing to move the poll cursor backwards"
                );
                return Ok(());
            }
        }
        self.save_json(CURSOR_FILE, &CursorFile {
            last_check: timestamp,
        })
    }

    /// Administrative cursor override. Unlike `save_cursor` this may move
    /// the cursor backwards (e.g. to reprocess a historical window) and
    /// must not be reachable from the poll loop.
    pub fn reset_cursor(&self, timestamp: DateTime<Utc>) -> Result<()> {
        self.save_json(CURSOR_FILE, &CursorFile {
            last_check: timestamp,
        })
    }

    pub fn load_token_totals(&self) -> TokenTotals {
        self.load_json(TOKEN_USAGE_FILE)
    }

    pub fn save_token_totals(&self, totals: &TokenTotals) -> Result<()> {
        self.save_json(TOKEN_USAGE_FILE, totals)
    }

    pub fn load_statistics(&self) -> Statistics {
        self.load_json(STATISTICS_FILE)
    }

    pub fn save_statistics(&self, stats: &Statistics) -> Result<()> {
        self.save_json(STATISTICS_FILE, stats)
    }
}

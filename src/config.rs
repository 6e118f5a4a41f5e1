use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

/// Which LLM backend analyzes comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBackend {
    /// Local Ollama instance — no API key needed, no per-token cost
    Ollama,
    /// Google Gemini cloud API — requires GEMINI_API_KEY
    Gemini,
    /// DeepSeek cloud API (OpenAI-compatible) — requires DEEPSEEK_API_KEY
    Deepseek,
}

impl ProviderBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderBackend::Ollama => "ollama",
            ProviderBackend::Gemini => "gemini",
            ProviderBackend::Deepseek => "deepseek",
        }
    }
}

/// Per-provider pricing in currency units per 1K tokens.
///
/// Supplied through the environment so a price change never requires a
/// rebuild. Defaults match each provider's published list price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub per_k_input: f64,
    pub per_k_output: f64,
}

impl Pricing {
    pub const FREE: Pricing = Pricing {
        per_k_input: 0.0,
        per_k_output: 0.0,
    };
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Clone)]
pub struct Config {
    // Reddit API (script app)
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_username: String,
    pub reddit_password: String,
    pub reddit_user_agent: String,
    pub subreddit: String,

    // LLM provider selection
    pub provider_backend: ProviderBackend,
    pub llm_timeout: Duration,

    // Ollama
    pub ollama_url: String,
    pub ollama_model: String,

    // Gemini
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_pricing: Pricing,

    // DeepSeek
    pub deepseek_api_key: String,
    pub deepseek_model: String,
    pub deepseek_max_tokens: u32,
    pub deepseek_temperature: f64,
    pub deepseek_pricing: Pricing,

    // Adaptive polling
    pub adaptive_base_interval: Duration,
    pub adaptive_increase_percentage: f64,
    pub adaptive_max_delay: Duration,

    // Outbound request pacing
    pub max_requests_per_minute: u32,
    pub min_request_delay: Duration,
    pub max_request_delay: Duration,

    // Moderation behavior
    pub safe_mode: bool,
    /// Accounts whose comments are never analyzed (mod team, bots).
    pub mod_allowlist: Vec<String>,

    // Transparency ledger
    pub ledger_enabled: bool,
    pub ledger_page_name: String,
    pub ledger_publish_threshold: u32,
    /// Minimum spacing between automatic publishes.
    pub ledger_publish_interval: Duration,

    // Persistence
    pub data_dir: PathBuf,
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => v.eq_ignore_ascii_case("true") || v == "1",
        Err(_) => default,
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Only operational tunables have defaults — Reddit credentials are
    /// required for anything beyond `status` and are checked separately
    /// by `require_reddit`.
    pub fn load() -> Result<Self> {
        let provider_backend = match env::var("LLM_PROVIDER").as_deref() {
            Ok("ollama") => ProviderBackend::Ollama,
            Ok("gemini") => ProviderBackend::Gemini,
            // "deepseek" or unset both default to DeepSeek
            _ => ProviderBackend::Deepseek,
        };

        let mod_allowlist = env::var("MOD_ALLOWLIST")
            .unwrap_or_else(|_| "AutoModerator".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            reddit_client_id: env::var("REDDIT_CLIENT_ID").unwrap_or_default(),
            reddit_client_secret: env::var("REDDIT_CLIENT_SECRET").unwrap_or_default(),
            reddit_username: env::var("REDDIT_USERNAME").unwrap_or_default(),
            reddit_password: env::var("REDDIT_PASSWORD").unwrap_or_default(),
            reddit_user_agent: env::var("REDDIT_USER_AGENT")
                .unwrap_or_else(|_| "warden/0.1 (comment moderation)".to_string()),
            subreddit: env::var("SUBREDDIT_TO_MONITOR").unwrap_or_default(),

            provider_backend,
            llm_timeout: Duration::from_secs_f64(env_f64("LLM_TIMEOUT", 500.0)),

            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "gemma3:latest".to_string()),

            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            gemini_pricing: Pricing {
                per_k_input: env_f64("GEMINI_PRICE_PER_K_INPUT", 0.000125),
                per_k_output: env_f64("GEMINI_PRICE_PER_K_OUTPUT", 0.000375),
            },

            deepseek_api_key: env::var("DEEPSEEK_API_KEY").unwrap_or_default(),
            deepseek_model: env::var("DEEPSEEK_MODEL")
                .unwrap_or_else(|_| "deepseek-chat".to_string()),
            deepseek_max_tokens: env_u32("DEEPSEEK_MAX_TOKENS", 1000),
            deepseek_temperature: env_f64("DEEPSEEK_TEMPERATURE", 0.1),
            deepseek_pricing: Pricing {
                per_k_input: env_f64("DEEPSEEK_PRICE_PER_K_INPUT", 0.00014),
                per_k_output: env_f64("DEEPSEEK_PRICE_PER_K_OUTPUT", 0.00028),
            },

            adaptive_base_interval: Duration::from_secs_f64(env_f64(
                "ADAPTIVE_BASE_INTERVAL",
                3.0,
            )),
            adaptive_increase_percentage: env_f64("ADAPTIVE_INCREASE_PERCENTAGE", 20.0),
            adaptive_max_delay: Duration::from_secs_f64(env_f64("ADAPTIVE_MAX_DELAY", 900.0)),

            max_requests_per_minute: env_u32("MAX_REQUESTS_PER_MINUTE", 4),
            min_request_delay: Duration::from_secs_f64(env_f64("MIN_REQUEST_DELAY", 7.0)),
            max_request_delay: Duration::from_secs_f64(env_f64("MAX_REQUEST_DELAY", 12.0)),

            safe_mode: env_bool("SAFE_MODE", true),
            mod_allowlist,

            ledger_enabled: env_bool("LEDGER_ENABLED", false),
            ledger_page_name: env::var("LEDGER_PAGE_NAME")
                .unwrap_or_else(|_| "removed_comments".to_string()),
            ledger_publish_threshold: env_u32("LEDGER_PUBLISH_THRESHOLD", 10),
            ledger_publish_interval: Duration::from_secs_f64(env_f64(
                "LEDGER_PUBLISH_INTERVAL",
                60.0,
            )),

            data_dir: env::var("WARDEN_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
        })
    }

    /// Check that all Reddit credentials are configured.
    /// Call this before any operation that talks to the Reddit API.
    pub fn require_reddit(&self) -> Result<()> {
        let required = [
            ("REDDIT_CLIENT_ID", &self.reddit_client_id),
            ("REDDIT_CLIENT_SECRET", &self.reddit_client_secret),
            ("REDDIT_USERNAME", &self.reddit_username),
            ("REDDIT_PASSWORD", &self.reddit_password),
            ("SUBREDDIT_TO_MONITOR", &self.subreddit),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}.\n\
                 Add them to your .env file. See .env.example for details.",
                missing.join(", ")
            );
        }
        Ok(())
    }

    /// Validate that the chosen provider backend has what it needs.
    /// For Ollama nothing is required beyond a reachable instance;
    /// the cloud backends need their API keys.
    pub fn require_provider(&self) -> Result<()> {
        match self.provider_backend {
            ProviderBackend::Ollama => Ok(()),
            ProviderBackend::Gemini => {
                if self.gemini_api_key.is_empty() {
                    anyhow::bail!(
                        "GEMINI_API_KEY not set. It is required when LLM_PROVIDER=gemini.\n\
                         Add it to your .env file, or switch to LLM_PROVIDER=ollama."
                    );
                }
                Ok(())
            }
            ProviderBackend::Deepseek => {
                if self.deepseek_api_key.is_empty() {
                    anyhow::bail!(
                        "DEEPSEEK_API_KEY not set. It is required when LLM_PROVIDER=deepseek.\n\
                         Add it to your .env file, or switch to LLM_PROVIDER=ollama."
                    );
                }
                Ok(())
            }
        }
    }

    /// Pricing table entry for the given backend.
    pub fn pricing_for(&self, backend: ProviderBackend) -> Pricing {
        match backend {
            ProviderBackend::Ollama => Pricing::FREE,
            ProviderBackend::Gemini => self.gemini_pricing,
            ProviderBackend::Deepseek => self.deepseek_pricing,
        }
    }
}

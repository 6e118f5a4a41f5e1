// LLM provider backends — the pluggable analysis layer.
//
// The trait in traits.rs is the seam; each submodule is one backend.
// Selection happens here so the orchestrator only ever sees a
// Box<dyn LlmProvider>.

pub mod deepseek;
pub mod gemini;
pub mod ollama;
pub mod traits;

use anyhow::Result;

use crate::config::{Config, ProviderBackend};

use traits::LlmProvider;

/// Build the configured provider.
///
/// Construction validates what can be validated offline (credentials
/// present, HTTP client buildable); reachability is `check_health`'s job.
pub fn create_provider(config: &Config) -> Result<Box<dyn LlmProvider>> {
    config.require_provider()?;

    let provider: Box<dyn LlmProvider> = match config.provider_backend {
        ProviderBackend::Ollama => Box::new(ollama::OllamaProvider::new(
            config.ollama_url.clone(),
            config.ollama_model.clone(),
            config.llm_timeout,
        )?),
        ProviderBackend::Gemini => Box::new(gemini::GeminiProvider::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_pricing,
            config.llm_timeout,
        )?),
        ProviderBackend::Deepseek => Box::new(deepseek::DeepseekProvider::new(
            config.deepseek_api_key.clone(),
            config.deepseek_model.clone(),
            config.deepseek_max_tokens,
            config.deepseek_temperature,
            config.deepseek_pricing,
            config.llm_timeout,
        )?),
    };

    Ok(provider)
}

// Ollama backend — local inference over the Ollama HTTP API.
//
// No API key, no per-token cost. Ollama doesn't report token usage on
// the generate endpoint we use, so counts are estimated.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::traits::{estimate_tokens, LlmProvider, TokenUsage};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn analyze(
        &self,
        system_prompt: &str,
        comment_text: &str,
    ) -> Result<(String, TokenUsage)> {
        let full_prompt = format!("{system_prompt}\n\nComment to analyze: {comment_text}");

        let request = GenerateRequest {
            model: &self.model,
            prompt: &full_prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Failed to call Ollama API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API returned {status}: {body}");
        }

        let result: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        let usage = TokenUsage {
            input_tokens: estimate_tokens(&full_prompt),
            output_tokens: estimate_tokens(&result.response),
            // Local inference is free
            estimated_cost: 0.0,
        };

        Ok((result.response, usage))
    }

    async fn check_health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .with_context(|| format!("Failed to connect to Ollama at {}", self.base_url))?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama returned {}", response.status());
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama tags response")?;

        let available: Vec<&str> = tags.models.iter().map(|m| m.name.as_str()).collect();
        if !available.iter().any(|name| name.contains(&self.model)) {
            anyhow::bail!(
                "Model '{}' not found in Ollama. Available models: {:?}",
                self.model,
                available
            );
        }

        info!(model = %self.model, "Ollama is running and the model is available");
        Ok(())
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

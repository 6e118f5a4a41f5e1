// Google Gemini backend — REST generateContent endpoint.
//
// Uses the v1beta REST API directly rather than an SDK; the surface the
// engine needs is one endpoint. Token counts come from the response's
// usageMetadata when present, estimation otherwise.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Pricing;

use super::traits::{calculate_cost, estimate_tokens, LlmProvider, TokenUsage};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    pricing: Pricing,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, pricing: Pricing, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            model,
            pricing,
        })
    }

    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<GenerateResponse> {
        let url = format!(
            "{API_BASE}/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens,
                temperature: 0.1,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to call Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API returned {status}: {body}");
        }

        response
            .json()
            .await
            .context("Failed to parse Gemini response")
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn analyze(
        &self,
        system_prompt: &str,
        comment_text: &str,
    ) -> Result<(String, TokenUsage)> {
        let full_prompt = format!("{system_prompt}\n\nComment to analyze: {comment_text}");

        let result = self.generate(&full_prompt, 1000).await?;
        let text = result
            .text()
            .context("Gemini response contained no candidates")?;

        let (input_tokens, output_tokens) = match result.usage_metadata {
            Some(usage) => (usage.prompt_token_count, usage.candidates_token_count),
            None => (estimate_tokens(&full_prompt), estimate_tokens(&text)),
        };

        let usage = TokenUsage {
            input_tokens,
            output_tokens,
            estimated_cost: calculate_cost(self.pricing, input_tokens, output_tokens),
        };

        Ok((text, usage))
    }

    async fn check_health(&self) -> Result<()> {
        // Minimal probe: one token of deterministic output
        let result = self.generate("Hello, this is a test.", 1).await?;
        if result.candidates.is_empty() {
            anyhow::bail!("Gemini returned no candidates for the health probe");
        }
        info!(model = %self.model, "Gemini API is accessible");
        Ok(())
    }
}

// --- Gemini REST request/response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let part = candidate.content.parts.first()?;
        Some(part.text.clone())
    }
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

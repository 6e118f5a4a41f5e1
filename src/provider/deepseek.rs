// DeepSeek backend — OpenAI-compatible chat completions API.
//
// The only backend that reports exact token usage, so its accounting
// comes straight from the response rather than estimation.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Pricing;

use super::traits::{calculate_cost, LlmProvider, TokenUsage};

const API_BASE: &str = "https://api.deepseek.com";

pub struct DeepseekProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    pricing: Pricing,
}

impl DeepseekProvider {
    pub fn new(
        api_key: String,
        model: String,
        max_tokens: u32,
        temperature: f64,
        pricing: Pricing,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            model,
            max_tokens,
            temperature,
            pricing,
        })
    }

    async fn chat(&self, messages: Vec<Message>, max_tokens: u32) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{API_BASE}/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to call DeepSeek API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("DeepSeek API returned {status}: {body}");
        }

        response
            .json()
            .await
            .context("Failed to parse DeepSeek response")
    }
}

#[async_trait]
impl LlmProvider for DeepseekProvider {
    fn name(&self) -> &'static str {
        "deepseek"
    }

    async fn analyze(
        &self,
        system_prompt: &str,
        comment_text: &str,
    ) -> Result<(String, TokenUsage)> {
        let messages = vec![
            Message {
                role: "system",
                content: system_prompt.to_string(),
            },
            Message {
                role: "user",
                content: comment_text.to_string(),
            },
        ];

        let result = self.chat(messages, self.max_tokens).await?;
        let text = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("DeepSeek response contained no choices")?;

        let usage = TokenUsage {
            input_tokens: result.usage.prompt_tokens,
            output_tokens: result.usage.completion_tokens,
            estimated_cost: calculate_cost(
                self.pricing,
                result.usage.prompt_tokens,
                result.usage.completion_tokens,
            ),
        };

        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            cost = usage.estimated_cost,
            "DeepSeek call accounted"
        );

        Ok((text, usage))
    }

    async fn check_health(&self) -> Result<()> {
        let messages = vec![Message {
            role: "user",
            content: "Hello, this is a test.".to_string(),
        }];
        let result = self.chat(messages, 1).await?;
        if result.choices.is_empty() {
            anyhow::bail!("DeepSeek returned no choices for the health probe");
        }
        info!(model = %self.model, "DeepSeek API is accessible");
        Ok(())
    }
}

// --- Chat completion request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

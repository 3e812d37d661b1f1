//! Hosted chat-completion generator
//!
//! `POST {base_url}/chat/completions` with a single user message.

use crate::config::ApiConfig;
use crate::rag::generator::{GenerationConfig, Generator};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible chat completions API
pub struct OpenAiGenerator {
    client: Client,
    config: GenerationConfig,
    api_key: String,
    endpoint: String,
}

impl OpenAiGenerator {
    pub fn new(config: GenerationConfig, api: &ApiConfig) -> Result<Self> {
        let api_key = api
            .api_key
            .clone()
            .context("OPENAI_API_KEY is required for generation")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build generation HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", api.base_url.trim_end_matches('/')),
            api_key,
            config,
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

/// First choice's message text
fn reply_text(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .context("Chat API returned no message content")
}

impl Generator for OpenAiGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!("Generating with {} ({} prompt chars)", self.config.model, prompt.chars().count());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .context("Chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            anyhow::bail!("Chat API returned HTTP {}: {}", status, detail.trim());
        }

        let body: ChatResponse = response
            .json()
            .context("Failed to decode chat completion response")?;

        reply_text(body)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

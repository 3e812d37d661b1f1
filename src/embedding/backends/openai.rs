//! Hosted embedding backend
//!
//! Calls an OpenAI-compatible `POST {base_url}/embeddings` endpoint with a
//! blocking client. Callers on an async runtime must go through
//! `spawn_blocking`.

use crate::config::ApiConfig;
use crate::embedding::{normalize_embedding, Embedder, Embedding, EmbeddingConfig};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedder backed by a hosted embeddings API
pub struct OpenAiEmbedder {
    client: Client,
    config: EmbeddingConfig,
    api_key: String,
    endpoint: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbeddingConfig, api: &ApiConfig) -> Result<Self> {
        let api_key = api
            .api_key
            .clone()
            .context("OPENAI_API_KEY is required for the openai embedding backend")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build embedding HTTP client")?;

        let dimension = known_dimension(&config.model_name).unwrap_or(config.dimension);

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", api.base_url.trim_end_matches('/')),
            api_key,
            config,
            dimension,
        })
    }
}

/// Output width of the published OpenAI embedding models
fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text])?
            .pop()
            .context("Embedding API returned no vectors")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.config.model_name,
            input: texts,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("Embedding request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Embedding API returned HTTP {}", response.status());
        }

        let mut body: EmbeddingResponse = response
            .json()
            .context("Failed to decode embedding response")?;

        if body.data.len() != texts.len() {
            anyhow::bail!(
                "Embedding API returned {} vectors for {} inputs",
                body.data.len(),
                texts.len()
            );
        }

        body.data.sort_by_key(|d| d.index);

        Ok(body
            .data
            .into_iter()
            .map(|d| {
                let mut embedding = d.embedding;
                if self.config.normalize {
                    normalize_embedding(&mut embedding);
                }
                embedding
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

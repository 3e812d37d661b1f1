//! Embedding backend implementations
//!
//! `openai` talks to a hosted OpenAI-compatible API; `token` and `mock`
//! run offline and are deterministic.

use crate::config::ApiConfig;
use crate::embedding::{normalize_embedding, Embedder, Embedding, EmbeddingConfig};
use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub mod openai;

pub use openai::OpenAiEmbedder;

/// Mock embedder for testing (generates random but deterministic embeddings)
pub struct MockEmbedder {
    config: EmbeddingConfig,
    dimension: usize,
}

impl MockEmbedder {
    /// Create a new mock embedder
    pub fn new(config: EmbeddingConfig, dimension: usize) -> Self {
        Self { config, dimension }
    }

    /// Generate a deterministic embedding based on text hash
    fn generate_embedding(&self, text: &str) -> Embedding {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut embedding: Embedding = (0..self.dimension)
            .map(|_| {
                // LCG step
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                ((state / 65536) % 10000) as f32 / 10000.0 - 0.5
            })
            .collect();

        if self.config.normalize {
            normalize_embedding(&mut embedding);
        }
        embedding
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.generate_embedding(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|&text| self.generate_embedding(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Hashed bag-of-words embedder
///
/// Needs no model or network, so it doubles as the offline backend. Texts that
/// share tokens get a positive cosine similarity; identical texts score 1.0.
pub struct TokenEmbedder {
    config: EmbeddingConfig,
    dimension: usize,
}

impl TokenEmbedder {
    /// Create a new token-based embedder
    pub fn new(config: EmbeddingConfig, dimension: usize) -> Self {
        Self { config, dimension }
    }

    fn generate_embedding(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0; self.dimension];

        let tokens: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|s| !s.is_empty())
            .collect();

        if tokens.is_empty() || self.dimension == 0 {
            return embedding;
        }

        for token in &tokens {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimension;
            embedding[idx] += 1.0;
        }

        let total_tokens = tokens.len() as f32;
        for val in embedding.iter_mut() {
            *val /= total_tokens;
        }

        if self.config.normalize {
            normalize_embedding(&mut embedding);
        }

        embedding
    }
}

impl Embedder for TokenEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.generate_embedding(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|&text| self.generate_embedding(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Create an embedder from the configured backend name
pub fn create_embedder(config: &EmbeddingConfig, api: &ApiConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config.clone(), api)?)),
        "token" => Ok(Arc::new(TokenEmbedder::new(config.clone(), config.dimension))),
        "mock" => Ok(Arc::new(MockEmbedder::new(config.clone(), config.dimension))),
        other => {
            tracing::warn!("Unknown backend '{}', using token-based embedder", other);
            Ok(Arc::new(TokenEmbedder::new(config.clone(), config.dimension)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_mock_embedder() {
        let config = EmbeddingConfig {
            model_name: "test-model".to_string(),
            normalize: true,
            ..Default::default()
        };
        let embedder = MockEmbedder::new(config, 128);

        let text = "Hello, world!";
        let emb = embedder.embed(text).unwrap();

        assert_eq!(emb.len(), 128);

        // Should be deterministic
        let emb2 = embedder.embed(text).unwrap();
        assert_eq!(emb, emb2);

        // Different text should give different embedding
        let emb3 = embedder.embed("Different text").unwrap();
        assert_ne!(emb, emb3);
    }

    #[test]
    fn test_token_embedder_korean_overlap() {
        let embedder = TokenEmbedder::new(EmbeddingConfig::default(), 256);

        let record = embedder
            .embed("삼성전자, 반도체 수요 급증으로 분기 최대 실적 달성")
            .unwrap();
        let query = embedder.embed("반도체 수요 증가").unwrap();
        let unrelated = embedder.embed("테슬라 자율주행 결함").unwrap();

        assert_eq!(record.len(), 256);
        assert!(cosine_similarity(&record, &query) > cosine_similarity(&unrelated, &query));
    }

    #[test]
    fn test_token_embedder_identical_text() {
        let embedder = TokenEmbedder::new(EmbeddingConfig::default(), 256);
        let a = embedder.embed("미국 연준 금리 인상").unwrap();
        let b = embedder.embed("미국 연준 금리 인상").unwrap();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_embedder_batch() {
        let embedder = MockEmbedder::new(EmbeddingConfig::default(), 64);

        let texts = vec!["text1", "text2", "text3"];
        let embeddings = embedder.embed_batch(&texts).unwrap();

        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0].len(), 64);
    }

    #[test]
    fn test_create_embedder_offline_backends() {
        let api = ApiConfig::default();
        let config = EmbeddingConfig {
            backend: "token".to_string(),
            model_name: "token-embedder".to_string(),
            dimension: 32,
            ..Default::default()
        };

        let embedder = create_embedder(&config, &api).unwrap();
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.model_name(), "token-embedder");

        let unknown = EmbeddingConfig {
            backend: "nope".to_string(),
            ..config
        };
        assert_eq!(create_embedder(&unknown, &api).unwrap().dimension(), 32);
    }
}

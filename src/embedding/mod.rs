//! Embedding generation and caching
//!
//! Provides a trait-based embedding interface with a hosted backend
//! (OpenAI-compatible `/embeddings`), offline fallbacks, and a persistent
//! SQLite cache.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod backends;
pub mod cache;

// Re-exports
pub use backends::*;
pub use cache::*;

/// Represents an embedding vector
pub type Embedding = Vec<f32>;

/// Configuration for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend name: openai, token, or mock
    pub backend: String,
    /// Model name sent to the backend and recorded in index metadata
    #[serde(alias = "model")]
    pub model_name: String,
    /// Vector dimension for the offline backends
    pub dimension: usize,
    /// Whether to L2-normalize embeddings
    pub normalize: bool,
    /// Texts per backend request when building an index
    pub batch_size: usize,
    /// Request timeout for hosted backends
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            model_name: "text-embedding-3-small".to_string(),
            dimension: 384,
            normalize: true,
            batch_size: 100,
            timeout_secs: 30,
        }
    }
}

/// Trait for embedding models
///
/// The same embedder must be used to build an index and to embed queries
/// against it; mixing models silently corrupts relevance.
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed multiple texts in batch
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Normalize an embedding vector (L2 normalization)
pub fn normalize_embedding(embedding: &mut Embedding) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        for val in embedding.iter_mut() {
            *val /= norm;
        }
    }
}

/// Calculate cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot_product / (norm_a * norm_b)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_embedding() {
        let mut emb = vec![3.0, 4.0];
        normalize_embedding(&mut emb);

        // 3-4-5 triangle, so normalized should be [0.6, 0.8]
        assert!((emb[0] - 0.6).abs() < 1e-6);
        assert!((emb[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_is_noop() {
        let mut emb = vec![0.0, 0.0, 0.0];
        normalize_embedding(&mut emb);
        assert_eq!(emb, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![1.0, 0.0];
        let d = vec![0.0, 1.0];
        assert!((cosine_similarity(&c, &d) - 0.0).abs() < 1e-6);

        // Mismatched dimensions and zero vectors score zero
        assert_eq!(cosine_similarity(&a, &c), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &c), 0.0);
    }
}

//! Retrieval engines
//!
//! Implements dense (cosine / HNSW), sparse (BM25), and weighted hybrid
//! retrieval over the news corpus.

use crate::data::CorpusRecord;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod dense;
pub mod sparse;
pub mod hybrid;

// Re-exports
pub use dense::*;
pub use sparse::*;
pub use hybrid::*;

/// Search result with record and relevance score
///
/// Dense scores are cosine similarities (at most 1.0); sparse scores are BM25
/// relevance and unbounded. The two scales are not comparable as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Position of the record in corpus load order
    pub record_id: usize,
    /// The record itself
    pub record: CorpusRecord,
    /// Relevance score (higher is better)
    pub score: f32,
    /// Rank in the result list (1-indexed)
    pub rank: usize,
}

/// Index metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Model name used for embeddings
    pub model_name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Number of records indexed
    pub num_records: usize,
    /// Index creation timestamp
    pub created_at: String,
}

/// Trait for retrieval engines
pub trait Retriever: Send + Sync {
    /// Retrieve the top-k most relevant records for a query, best first
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>>;

    /// Get the name of this retriever
    fn name(&self) -> &str;
}

/// Order `(record_id, score)` pairs by descending score, then corpus order
pub(crate) fn rank_by_score(scored: &mut [(usize, f32)]) {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Turn ranked `(record_id, score)` pairs into 1-indexed search results
pub(crate) fn to_results(ranked: &[(usize, f32)], records: &[CorpusRecord]) -> Vec<SearchResult> {
    ranked
        .iter()
        .filter_map(|&(record_id, score)| {
            records.get(record_id).map(|record| (record_id, record, score))
        })
        .enumerate()
        .map(|(rank, (record_id, record, score))| SearchResult {
            record_id,
            record: record.clone(),
            score,
            rank: rank + 1,
        })
        .collect()
}

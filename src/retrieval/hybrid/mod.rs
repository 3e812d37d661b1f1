//! Hybrid retrieval
//!
//! Weighted fusion of dense and sparse retrieval signals.

use crate::retrieval::{Retriever, SearchResult};
use anyhow::Result;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// Dense/sparse fusion weights, normalized to sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HybridWeights {
    dense: f32,
    sparse: f32,
}

impl HybridWeights {
    /// Validate and normalize a weight pair
    ///
    /// Both weights must be finite and non-negative, and not both zero.
    pub fn new(dense: f32, sparse: f32) -> Result<Self> {
        if !dense.is_finite() || !sparse.is_finite() || dense < 0.0 || sparse < 0.0 {
            anyhow::bail!("Hybrid weights must be non-negative, got ({}, {})", dense, sparse);
        }

        let total = dense + sparse;
        if total <= 0.0 {
            anyhow::bail!("Hybrid weights must not both be zero");
        }

        Ok(Self {
            dense: dense / total,
            sparse: sparse / total,
        })
    }

    pub fn dense(&self) -> f32 {
        self.dense
    }

    pub fn sparse(&self) -> f32 {
        self.sparse
    }
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            dense: 0.5,
            sparse: 0.5,
        }
    }
}

/// Configuration for hybrid fusion
#[derive(Debug, Clone)]
pub struct HybridConfig {
    pub weights: HybridWeights,
    /// Each source is asked for `top_k * fetch_multiplier` results
    pub fetch_multiplier: usize,
    /// Divide sparse scores by the query's best sparse score before fusing
    pub normalize_sparse: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            weights: HybridWeights::default(),
            fetch_multiplier: 2,
            normalize_sparse: true,
        }
    }
}

/// One source's contribution to a fused ranking
struct SourceResults {
    weight: f32,
    normalize: bool,
    results: Vec<SearchResult>,
}

/// Hybrid retriever combining a dense and a sparse retriever by weighted sum
///
/// Either side may be absent; the other is then passed through unchanged.
pub struct HybridRetriever {
    dense: Option<Arc<dyn Retriever>>,
    sparse: Option<Arc<dyn Retriever>>,
    config: HybridConfig,
}

impl HybridRetriever {
    /// Create a new hybrid retriever
    pub fn new(
        dense: Option<Arc<dyn Retriever>>,
        sparse: Option<Arc<dyn Retriever>>,
        config: HybridConfig,
    ) -> Self {
        Self {
            dense,
            sparse,
            config,
        }
    }

    pub fn has_dense(&self) -> bool {
        self.dense.is_some()
    }

    pub fn has_sparse(&self) -> bool {
        self.sparse.is_some()
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    /// Sources to query, with the weight each contributes
    ///
    /// A lone available source is used with full weight; with both available
    /// a zero-weight source is skipped entirely.
    fn active_sources(&self) -> Vec<(&Arc<dyn Retriever>, f32, bool)> {
        let weights = self.config.weights;
        let normalize = self.config.normalize_sparse;

        match (&self.dense, &self.sparse) {
            (Some(dense), Some(sparse)) => {
                let mut sources = Vec::with_capacity(2);
                if weights.dense() > 0.0 {
                    sources.push((dense, weights.dense(), false));
                }
                if weights.sparse() > 0.0 {
                    sources.push((sparse, weights.sparse(), normalize));
                }
                sources
            }
            (Some(dense), None) => vec![(dense, 1.0, false)],
            (None, Some(sparse)) => vec![(sparse, 1.0, normalize)],
            (None, None) => Vec::new(),
        }
    }

    /// Sum weighted scores per record
    ///
    /// Ties keep first-appearance order: dense results first, then sparse.
    fn weighted_fusion(sources: Vec<SourceResults>) -> Vec<SearchResult> {
        let mut first_seen: Vec<usize> = Vec::new();
        let mut fused: HashMap<usize, (SearchResult, f32)> = HashMap::new();

        for source in sources {
            let best = source
                .results
                .iter()
                .map(|r| r.score)
                .fold(0.0_f32, f32::max);

            for result in source.results {
                let score = if source.normalize && best > 0.0 {
                    result.score / best
                } else {
                    result.score
                };
                let contribution = source.weight * score;

                match fused.entry(result.record_id) {
                    Entry::Occupied(mut entry) => entry.get_mut().1 += contribution,
                    Entry::Vacant(entry) => {
                        first_seen.push(result.record_id);
                        entry.insert((result, contribution));
                    }
                }
            }
        }

        let mut merged: Vec<(SearchResult, f32)> = first_seen
            .into_iter()
            .filter_map(|id| fused.remove(&id))
            .collect();

        // Stable sort keeps first-appearance order among equal scores
        merged.sort_by(|a, b| b.1.total_cmp(&a.1));

        merged
            .into_iter()
            .enumerate()
            .map(|(idx, (mut result, score))| {
                result.rank = idx + 1;
                result.score = score;
                result
            })
            .collect()
    }
}

impl Retriever for HybridRetriever {
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let sources = self.active_sources();
        if sources.is_empty() {
            tracing::warn!("No retrievers available; returning empty context");
            return Ok(Vec::new());
        }

        let fetch_k = top_k.saturating_mul(self.config.fetch_multiplier.max(1));

        let mut collected = Vec::with_capacity(sources.len());
        for (retriever, weight, normalize) in sources {
            match retriever.retrieve(query, fetch_k) {
                Ok(results) => {
                    tracing::debug!(
                        "Retriever '{}' returned {} results",
                        retriever.name(),
                        results.len()
                    );
                    collected.push(SourceResults {
                        weight,
                        normalize,
                        results,
                    });
                }
                Err(e) => {
                    tracing::warn!("Retriever '{}' failed: {:#}", retriever.name(), e);
                }
            }
        }

        if collected.is_empty() {
            anyhow::bail!("All retrievers failed");
        }

        let mut fused = Self::weighted_fusion(collected);
        fused.truncate(top_k);

        Ok(fused)
    }

    fn name(&self) -> &str {
        "hybrid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CorpusRecord;
    use crate::embedding::{Embedder, EmbeddingConfig, TokenEmbedder};
    use crate::retrieval::{DenseConfig, DenseRetriever, SparseRetriever};

    struct MockRetriever {
        name: String,
        results: Vec<SearchResult>,
    }

    impl MockRetriever {
        fn new(name: &str, scored: &[(usize, f32)]) -> Arc<dyn Retriever> {
            let results = scored
                .iter()
                .enumerate()
                .map(|(idx, &(record_id, score))| SearchResult {
                    record_id,
                    record: CorpusRecord::new(format!("record {}", record_id)),
                    score,
                    rank: idx + 1,
                })
                .collect();

            Arc::new(Self {
                name: name.to_string(),
                results,
            })
        }
    }

    impl Retriever for MockRetriever {
        fn retrieve(&self, _query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
            Ok(self.results.iter().take(top_k).cloned().collect())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct FailingRetriever;

    impl Retriever for FailingRetriever {
        fn retrieve(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchResult>> {
            anyhow::bail!("embedding backend unreachable")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn ids(results: &[SearchResult]) -> Vec<usize> {
        results.iter().map(|r| r.record_id).collect()
    }

    fn raw_config(dense: f32, sparse: f32) -> HybridConfig {
        HybridConfig {
            weights: HybridWeights::new(dense, sparse).unwrap(),
            normalize_sparse: false,
            ..Default::default()
        }
    }

    fn news_corpus() -> Vec<CorpusRecord> {
        vec![
            CorpusRecord::new("미국 연준, 금리 인상 발표로 나스닥 지수 하락 및 기술주 약세"),
            CorpusRecord::new("삼성전자, 반도체 수요 급증으로 분기 최대 실적 달성"),
            CorpusRecord::new("이차전지 섹터 수주 소식에 따른 관련주 동반 상승"),
            CorpusRecord::new("테슬라, 자율주행 소프트웨어 결함으로 주가 하락 사례"),
            CorpusRecord::new("반도체 장비 수출 규제 강화로 관련주 하락"),
            CorpusRecord::new("국제 유가 급등에 정유주 강세"),
        ]
    }

    fn real_retrievers(records: Vec<CorpusRecord>) -> (Arc<dyn Retriever>, Arc<dyn Retriever>) {
        let embedder = Arc::new(TokenEmbedder::new(EmbeddingConfig::default(), 256)) as Arc<dyn Embedder>;
        let dense = DenseRetriever::build(records.clone(), embedder, DenseConfig::default()).unwrap();
        let sparse = SparseRetriever::build(records).unwrap();
        (Arc::new(dense), Arc::new(sparse))
    }

    #[test]
    fn test_weights_are_validated_and_normalized() {
        let w = HybridWeights::new(3.0, 1.0).unwrap();
        assert!((w.dense() - 0.75).abs() < 1e-6);
        assert!((w.sparse() - 0.25).abs() < 1e-6);

        assert!(HybridWeights::new(0.0, 0.0).is_err());
        assert!(HybridWeights::new(-0.5, 1.0).is_err());
        assert!(HybridWeights::new(f32::NAN, 1.0).is_err());
        assert_eq!(HybridWeights::default().dense(), 0.5);
    }

    #[test]
    fn test_weighted_fusion_sums_per_record() {
        let dense = MockRetriever::new("dense", &[(1, 0.9), (2, 0.7)]);
        let sparse = MockRetriever::new("sparse", &[(2, 0.95), (3, 0.8)]);

        let hybrid = HybridRetriever::new(Some(dense), Some(sparse), raw_config(0.5, 0.5));
        let results = hybrid.retrieve("test query", 3).unwrap();

        // record 2: 0.5*0.7 + 0.5*0.95 = 0.825; record 1: 0.45; record 3: 0.4
        assert_eq!(ids(&results), vec![2, 1, 3]);
        assert!((results[0].score - 0.825).abs() < 1e-6);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[2].rank, 3);
    }

    #[test]
    fn test_ties_prefer_dense_first_appearance() {
        let dense = MockRetriever::new("dense", &[(4, 0.6)]);
        let sparse = MockRetriever::new("sparse", &[(9, 0.6)]);

        let hybrid = HybridRetriever::new(Some(dense), Some(sparse), raw_config(0.5, 0.5));
        let results = hybrid.retrieve("q", 2).unwrap();

        assert_eq!(ids(&results), vec![4, 9]);
    }

    #[test]
    fn test_sparse_normalization() {
        let dense = MockRetriever::new("dense", &[(1, 0.8), (2, 0.1)]);
        let sparse = MockRetriever::new("sparse", &[(2, 12.0), (1, 3.0)]);

        // Raw BM25 magnitudes swamp the dense signal
        let raw = HybridRetriever::new(Some(dense.clone()), Some(sparse.clone()), raw_config(0.5, 0.5));
        assert_eq!(ids(&raw.retrieve("q", 2).unwrap()), vec![2, 1]);

        // Scaled to the best sparse hit both sources weigh in on the same scale
        let normalized = HybridRetriever::new(Some(dense), Some(sparse), HybridConfig::default());
        let results = normalized.retrieve("q", 2).unwrap();
        // record 1: 0.5*0.8 + 0.5*0.25 = 0.525; record 2: 0.5*0.1 + 0.5*1.0 = 0.55
        assert_eq!(ids(&results), vec![2, 1]);
        assert!(results.iter().all(|r| r.score <= 1.0));
    }

    #[test]
    fn test_truncates_and_fetches_more_than_k() {
        let dense = MockRetriever::new("dense", &[(1, 0.9), (2, 0.8), (3, 0.7), (4, 0.6)]);
        let hybrid = HybridRetriever::new(Some(dense), None, HybridConfig::default());

        let results = hybrid.retrieve("q", 2).unwrap();
        assert_eq!(ids(&results), vec![1, 2]);
        assert!(hybrid.retrieve("q", 0).unwrap().is_empty());
    }

    #[test]
    fn test_pass_through_when_one_side_missing() {
        let sparse = MockRetriever::new("sparse", &[(5, 7.5), (6, 2.5)]);
        let hybrid = HybridRetriever::new(None, Some(sparse), raw_config(1.0, 0.0));

        let results = hybrid.retrieve("q", 2).unwrap();
        assert_eq!(ids(&results), vec![5, 6]);
        assert!(!hybrid.has_dense());
    }

    #[test]
    fn test_pass_through_when_one_side_fails() {
        let sparse = MockRetriever::new("sparse", &[(5, 7.5), (6, 2.5)]);
        let hybrid = HybridRetriever::new(
            Some(Arc::new(FailingRetriever)),
            Some(sparse),
            HybridConfig::default(),
        );

        let results = hybrid.retrieve("q", 2).unwrap();
        assert_eq!(ids(&results), vec![5, 6]);
    }

    #[test]
    fn test_all_failed_is_error_and_none_is_empty() {
        let hybrid = HybridRetriever::new(Some(Arc::new(FailingRetriever)), None, HybridConfig::default());
        assert!(hybrid.retrieve("q", 2).is_err());

        let empty = HybridRetriever::new(None, None, HybridConfig::default());
        assert!(empty.retrieve("q", 2).unwrap().is_empty());
    }

    #[test]
    fn test_empty_corpus_everywhere() {
        let (dense, sparse) = real_retrievers(Vec::new());

        assert!(dense.retrieve("반도체", 3).unwrap().is_empty());
        assert!(sparse.retrieve("반도체", 3).unwrap().is_empty());

        let hybrid = HybridRetriever::new(Some(dense), Some(sparse), HybridConfig::default());
        assert!(hybrid.retrieve("반도체", 3).unwrap().is_empty());
    }

    #[test]
    fn test_sources_return_exactly_k() {
        let (dense, sparse) = real_retrievers(news_corpus());

        for k in 1..=6 {
            for retriever in [&dense, &sparse] {
                let results = retriever.retrieve("반도체 수요 증가", k).unwrap();
                assert_eq!(results.len(), k, "{} with k={}", retriever.name(), k);
                assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
            }
        }
    }

    #[test]
    fn test_identical_record_ranks_first_for_any_weights() {
        let records = news_corpus();
        let (dense, sparse) = real_retrievers(records.clone());

        for target in [0, 1, 3, 4] {
            let query = &records[target].text;
            for (wd, ws) in [(1.0, 0.0), (0.0, 1.0), (0.5, 0.5), (0.9, 0.1), (0.1, 0.9)] {
                let hybrid = HybridRetriever::new(
                    Some(dense.clone()),
                    Some(sparse.clone()),
                    HybridConfig {
                        weights: HybridWeights::new(wd, ws).unwrap(),
                        ..Default::default()
                    },
                );
                let results = hybrid.retrieve(query, 3).unwrap();
                assert_eq!(results[0].record_id, target, "weights ({}, {})", wd, ws);
            }
        }
    }

    #[test]
    fn test_extreme_weights_reproduce_single_source_ranking() {
        let (dense, sparse) = real_retrievers(news_corpus());
        let query = "반도체 관련주 하락";

        for normalize_sparse in [true, false] {
            let dense_only = HybridRetriever::new(
                Some(dense.clone()),
                Some(sparse.clone()),
                HybridConfig {
                    weights: HybridWeights::new(1.0, 0.0).unwrap(),
                    normalize_sparse,
                    ..Default::default()
                },
            );
            let sparse_only = HybridRetriever::new(
                Some(dense.clone()),
                Some(sparse.clone()),
                HybridConfig {
                    weights: HybridWeights::new(0.0, 1.0).unwrap(),
                    normalize_sparse,
                    ..Default::default()
                },
            );

            assert_eq!(
                ids(&dense_only.retrieve(query, 4).unwrap()),
                ids(&dense.retrieve(query, 4).unwrap())
            );
            assert_eq!(
                ids(&sparse_only.retrieve(query, 4).unwrap()),
                ids(&sparse.retrieve(query, 4).unwrap())
            );
        }
    }
}

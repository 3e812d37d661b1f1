//! Analysis pipeline orchestration
//!
//! Coordinates retrieval, market data, prompt assembly and generation for a
//! single request, and owns the swappable retriever set.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use crate::data::loaders;
use crate::data::CorpusRecord;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::market::MarketFetcher;
use crate::retrieval::{
    DenseConfig, DenseRetriever, HybridConfig, HybridRetriever, Retriever, SearchResult,
    SparseRetriever,
};

use super::context::{assemble_prompt, related_stocks, PromptInputs};
use super::generator::Generator;
use super::query::{AnalyzeRequest, AnalyzeResponse, DecisionReport, ReloadResponse};

/// Whether an analysis consults the corpus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Retrieve similar past news and include it in the prompt
    #[default]
    Rag,
    /// Market data and the request only
    NoRag,
}

/// Builds the dense and sparse retrievers for a corpus
pub struct IndexBuilder {
    corpus_path: PathBuf,
    index_dir: Option<PathBuf>,
    embedder: Option<Arc<dyn Embedder>>,
    dense_config: DenseConfig,
    hybrid_config: HybridConfig,
}

impl IndexBuilder {
    /// Sparse-only builder; add an embedder to enable dense retrieval
    pub fn new(corpus_path: impl Into<PathBuf>, hybrid_config: HybridConfig) -> Self {
        Self {
            corpus_path: corpus_path.into(),
            index_dir: None,
            embedder: None,
            dense_config: DenseConfig::default(),
            hybrid_config,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Persist the dense index here and reuse it at startup
    pub fn with_index_dir(mut self, index_dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(index_dir.into());
        self
    }

    pub fn with_dense_config(mut self, config: DenseConfig) -> Self {
        self.dense_config = config;
        self
    }

    pub fn corpus_path(&self) -> &Path {
        &self.corpus_path
    }

    /// Build both retrievers over `records`
    ///
    /// A retriever that cannot be built is left out and the hybrid passes
    /// through the other one.
    pub fn build(&self, records: Vec<CorpusRecord>, reuse_persisted: bool) -> (HybridRetriever, ReloadResponse) {
        let start = Instant::now();

        let dense = self.build_dense(&records, reuse_persisted);
        let sparse = match SparseRetriever::build(records.clone()) {
            Ok(sparse) => Some(sparse),
            Err(e) => {
                tracing::error!("BM25 index build failed: {:#}", e);
                None
            }
        };

        let status = ReloadResponse {
            records: records.len(),
            dense: dense.is_some(),
            sparse: sparse.is_some(),
        };

        tracing::info!(
            "Retrievers ready in {}ms: {} records (dense: {}, sparse: {})",
            start.elapsed().as_millis(),
            status.records,
            status.dense,
            status.sparse
        );

        let retriever = HybridRetriever::new(
            dense.map(|d| Arc::new(d) as Arc<dyn Retriever>),
            sparse.map(|s| Arc::new(s) as Arc<dyn Retriever>),
            self.hybrid_config.clone(),
        );

        (retriever, status)
    }

    /// Build the dense index, or reuse the saved one when it matches `records`
    pub fn build_dense(&self, records: &[CorpusRecord], reuse_persisted: bool) -> Option<DenseRetriever> {
        let Some(embedder) = self.embedder.clone() else {
            tracing::info!("No embedder configured; dense retrieval disabled");
            return None;
        };

        if reuse_persisted {
            if let Some(dir) = self.index_dir.as_deref().filter(|d| DenseRetriever::exists(d)) {
                match DenseRetriever::load(dir, embedder.clone(), self.dense_config.clone()) {
                    Ok(dense) if dense.records() == records => return Some(dense),
                    Ok(_) => tracing::warn!(
                        "Saved dense index at {:?} does not match the corpus; rebuilding",
                        dir
                    ),
                    Err(e) => tracing::warn!("Saved dense index unusable: {:#}; rebuilding", e),
                }
            }
        }

        match DenseRetriever::build(records.to_vec(), embedder, self.dense_config.clone()) {
            Ok(dense) => {
                if let Some(dir) = self.index_dir.as_deref().filter(|_| !dense.is_empty()) {
                    if let Err(e) = dense.save(dir) {
                        tracing::warn!("Failed to save dense index to {:?}: {:#}", dir, e);
                    }
                }
                Some(dense)
            }
            Err(e) => {
                tracing::error!(
                    "Dense index build failed: {:#}; continuing with sparse retrieval only",
                    e
                );
                None
            }
        }
    }
}

struct LoadedIndex {
    retriever: Arc<HybridRetriever>,
    status: ReloadResponse,
}

/// Shared, swappable retriever set
///
/// Queries clone the current `Arc` under a short read lock; reloads build a
/// complete replacement outside the lock and swap it in.
pub struct RetrieverHandle {
    current: RwLock<LoadedIndex>,
    builder: IndexBuilder,
    reloading: Mutex<()>,
}

impl RetrieverHandle {
    /// Load the corpus and build retrievers, degrading to an empty corpus
    pub fn open(builder: IndexBuilder) -> Self {
        let load = loaders::load_or_empty(builder.corpus_path());
        let (retriever, status) = builder.build(load.records, true);
        Self::new(retriever, status, builder)
    }

    pub fn new(retriever: HybridRetriever, status: ReloadResponse, builder: IndexBuilder) -> Self {
        Self {
            current: RwLock::new(LoadedIndex {
                retriever: Arc::new(retriever),
                status,
            }),
            builder,
            reloading: Mutex::new(()),
        }
    }

    pub fn current(&self) -> Arc<HybridRetriever> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard.retriever)
    }

    pub fn status(&self) -> ReloadResponse {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        guard.status.clone()
    }

    /// Rebuild from the corpus file and swap the new retrievers in
    ///
    /// An unreadable corpus keeps the current retrievers and is reported as
    /// an error. The saved dense index is rebuilt, not reused.
    pub fn reload(&self) -> Result<ReloadResponse> {
        let _reloading = self.reloading.lock().unwrap_or_else(PoisonError::into_inner);

        let records = loaders::load(self.builder.corpus_path())?;
        let (retriever, status) = self.builder.build(records, false);

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = LoadedIndex {
            retriever: Arc::new(retriever),
            status: status.clone(),
        };

        tracing::info!("Retrievers reloaded: {} records", status.records);
        Ok(status)
    }
}

/// Runs analyses against shared retrievers, market data and a generator
pub struct Analyzer {
    retrievers: Arc<RetrieverHandle>,
    generator: Arc<dyn Generator>,
    market: Arc<MarketFetcher>,
    top_k: usize,
}

impl Analyzer {
    pub fn new(
        retrievers: Arc<RetrieverHandle>,
        generator: Arc<dyn Generator>,
        market: Arc<MarketFetcher>,
        top_k: usize,
    ) -> Self {
        Self {
            retrievers,
            generator,
            market,
            top_k,
        }
    }

    pub fn retrievers(&self) -> &Arc<RetrieverHandle> {
        &self.retrievers
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Top-k similar records; retrieval failure degrades to no context
    pub fn retrieve_context(&self, query: &str) -> Vec<SearchResult> {
        let retriever = self.retrievers.current();
        match retriever.retrieve(query, self.top_k) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Retrieval failed: {:#}; continuing without context", e);
                Vec::new()
            }
        }
    }

    /// Produce a decision for one request
    ///
    /// Blocks on network I/O. Never fails: each stage degrades to its
    /// substitute value.
    pub fn analyze(&self, request: &AnalyzeRequest, mode: AnalysisMode) -> AnalyzeResponse {
        let retrieval_start = Instant::now();
        let context = match mode {
            AnalysisMode::Rag => Some(self.retrieve_context(&request.content)),
            AnalysisMode::NoRag => None,
        };
        let retrieval_time_ms = retrieval_start.elapsed().as_millis();

        let mut snapshot = self.market.fetch();
        request.apply_overrides(&mut snapshot);

        let inputs = PromptInputs {
            stock_name: &request.stock_name,
            related_stocks: related_stocks(&request.stock_name),
            news_content: &request.content,
            snapshot: &snapshot,
        };
        let prompt = assemble_prompt(&inputs, context.as_deref());

        let generation_start = Instant::now();
        let decision_report = match self.generator.generate(&prompt) {
            Ok(text) => DecisionReport::parse(&text),
            Err(e) => {
                tracing::warn!("Generation with {} failed: {:#}", self.generator.model_name(), e);
                DecisionReport::generation_failed(&format!("{:#}", e))
            }
        };

        tracing::info!(
            "Analyzed {} ({:?}): decision={}, cases={}, retrieval={}ms, generation={}ms",
            request.stock_name,
            mode,
            decision_report.decision,
            context.as_ref().map_or(0, Vec::len),
            retrieval_time_ms,
            generation_start.elapsed().as_millis()
        );

        let referenced_cases = context
            .unwrap_or_default()
            .into_iter()
            .map(|result| result.record.text)
            .collect();

        AnalyzeResponse {
            stock: request.stock_name.clone(),
            decision_report,
            referenced_cases,
            market_data_used: snapshot,
        }
    }
}

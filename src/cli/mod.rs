//! Command-line interface
//!
//! Provides CLI commands for serve, index, query, market and stats. Setup that
//! touches blocking HTTP clients or builds indexes runs on the blocking pool.

use crate::config::Settings;
use crate::data::loaders;
use crate::embedding::{create_embedder, CachedEmbedder, Embedder};
use crate::market::{MarketFetcher, YahooChartSource};
use crate::rag::{create_generator, Analyzer, IndexBuilder, RetrieverHandle};
use crate::retrieval::{DenseRetriever, Retriever, SearchResult, SparseRetriever};
use crate::server::{self, AppState};
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::sync::Arc;

/// Which retriever a `query` runs against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RetrieverKind {
    Dense,
    Sparse,
    #[default]
    Hybrid,
}

/// Create the configured embedder, wrapped in the SQLite cache when enabled
///
/// Returns `None` when the backend cannot be created (e.g. no API key); the
/// service then runs sparse-only.
pub fn build_embedder(settings: &Settings) -> Option<Arc<dyn Embedder>> {
    let embedder = match create_embedder(&settings.embedding, &settings.api) {
        Ok(embedder) => embedder,
        Err(e) => {
            tracing::error!("Embedding backend unavailable: {:#}; dense retrieval disabled", e);
            return None;
        }
    };

    let Some(cache_path) = settings.embedding_cache.as_deref() else {
        return Some(embedder);
    };

    match CachedEmbedder::open(Arc::clone(&embedder), cache_path) {
        Ok(cached) => {
            tracing::info!("Embedding cache: {:?}", cache_path);
            Some(Arc::new(cached))
        }
        Err(e) => {
            tracing::warn!("Embedding cache unavailable: {:#}; continuing uncached", e);
            Some(embedder)
        }
    }
}

/// Index builder for the configured corpus, index directory and embedder
pub fn index_builder(settings: &Settings, embedder: Option<Arc<dyn Embedder>>) -> Result<IndexBuilder> {
    let mut builder = IndexBuilder::new(&settings.corpus_path, settings.hybrid_config()?)
        .with_dense_config(settings.dense_config());

    if let Some(dir) = &settings.index_dir {
        builder = builder.with_index_dir(dir);
    }
    if let Some(embedder) = embedder {
        builder = builder.with_embedder(embedder);
    }

    Ok(builder)
}

fn market_fetcher(settings: &Settings) -> Result<MarketFetcher> {
    let source = YahooChartSource::new(&settings.market.base_url, settings.market.timeout_secs)?;
    Ok(MarketFetcher::new(Arc::new(source), settings.market.bok_rate.clone()))
}

/// Build the shared application state
pub fn build_state(settings: &Settings) -> Result<AppState> {
    let generator = create_generator(&settings.generation, &settings.api)
        .context("Failed to create generator")?;

    let builder = index_builder(settings, build_embedder(settings))?;
    let retrievers = Arc::new(RetrieverHandle::open(builder));
    let market = Arc::new(market_fetcher(settings)?);

    let analyzer = Analyzer::new(retrievers, generator, market, settings.retrieval.top_k);
    Ok(AppState::new(Arc::new(analyzer)))
}

/// Execute the serve command
pub async fn serve(settings: Settings) -> Result<()> {
    tracing::info!("Starting server");
    tracing::info!("  Corpus: {:?}", settings.corpus_path);
    tracing::info!("  Generation model: {}", settings.generation.model);
    tracing::info!("  Embedding: {} ({})", settings.embedding.backend, settings.embedding.model_name);

    let addr = settings.server.addr.clone();
    let state = tokio::task::spawn_blocking(move || build_state(&settings)).await??;

    server::serve(state, &addr).await
}

/// Build the dense index and save it to the index directory
pub fn build_index(settings: &Settings) -> Result<DenseRetriever> {
    let index_dir = settings
        .index_dir
        .as_deref()
        .context("index_dir must be set to save an index")?;

    let embedder = build_embedder(settings).context("No embedding backend available")?;
    let records = loaders::load(&settings.corpus_path)?;

    let dense = DenseRetriever::build(records, embedder, settings.dense_config())?;
    dense.save(index_dir)?;
    Ok(dense)
}

/// Execute the index command
pub async fn index(settings: Settings) -> Result<()> {
    tracing::info!("Building dense index from {:?}", settings.corpus_path);

    let dense = tokio::task::spawn_blocking(move || build_index(&settings)).await??;
    let metadata = dense.metadata();

    println!("\nIndex Summary:");
    println!("  Records indexed: {}", metadata.num_records);
    println!("  Model: {}", metadata.model_name);
    println!("  Dimension: {}", metadata.dimension);

    Ok(())
}

/// Run a query against one retriever over the configured corpus
pub fn run_query(settings: &Settings, query: &str, top_k: usize, kind: RetrieverKind) -> Result<Vec<SearchResult>> {
    let records = loaders::load(&settings.corpus_path)?;

    let retriever: Arc<dyn Retriever> = match kind {
        RetrieverKind::Sparse => Arc::new(SparseRetriever::build(records)?),
        RetrieverKind::Dense => {
            let builder = index_builder(settings, build_embedder(settings))?;
            let dense = builder
                .build_dense(&records, true)
                .context("Dense retriever unavailable")?;
            Arc::new(dense)
        }
        RetrieverKind::Hybrid => {
            let builder = index_builder(settings, build_embedder(settings))?;
            Arc::new(builder.build(records, true).0)
        }
    };

    retriever.retrieve(query, top_k)
}

/// Execute the query command
pub async fn query(settings: Settings, query: String, top_k: Option<usize>, kind: RetrieverKind) -> Result<()> {
    let top_k = top_k.unwrap_or(settings.retrieval.top_k);
    tracing::info!("Starting query");
    tracing::info!("  Query: {}", query);
    tracing::info!("  Top-k: {}", top_k);
    tracing::info!("  Retriever: {:?}", kind);

    let text = query.clone();
    let results = tokio::task::spawn_blocking(move || run_query(&settings, &text, top_k, kind)).await??;

    println!("\nQuery: {}", query);
    println!("Retriever: {:?}", kind);
    println!("Found {} results:\n", results.len());

    for result in &results {
        println!("Rank {}: record #{} (score: {:.4})", result.rank, result.record_id, result.score);
        if let Some(title) = &result.record.title {
            println!("  Title: {}", title);
        }
        println!("  Content: {}", result.record.text.chars().take(200).collect::<String>());
        if result.record.text.chars().count() > 200 {
            println!("  ...");
        }
        println!();
    }

    Ok(())
}

/// Execute the market command
pub async fn market(settings: Settings) -> Result<()> {
    let snapshot = tokio::task::spawn_blocking(move || -> Result<_> {
        Ok(market_fetcher(&settings)?.fetch())
    })
    .await??;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Execute the stats command
pub fn stats(settings: &Settings) -> Result<()> {
    let records = loaders::load(&settings.corpus_path)?;
    let stats = loaders::stats(&records);

    println!("\nCorpus Statistics: {:?}", settings.corpus_path);
    println!("  Records: {}", stats.total_records);
    match stats.longest_index {
        Some(idx) => {
            println!("  Longest record: #{} ({} chars)", idx, stats.max_chars);
            println!("  Approx. tokens: {}", stats.approx_max_tokens);
        }
        None => println!("  Corpus is empty"),
    }

    Ok(())
}

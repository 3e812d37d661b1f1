//! Dense retrieval
//!
//! Cosine similarity over record embeddings, either by exact scan or by
//! approximate nearest neighbour search via hnsw_rs.

use crate::data::CorpusRecord;
use crate::embedding::{cosine_similarity, Embedder, Embedding};
use crate::retrieval::{rank_by_score, to_results, IndexMetadata, Retriever, SearchResult};
use anyhow::{Context, Result};
use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const METADATA_FILE: &str = "metadata.json";
const RECORDS_FILE: &str = "records.json";
const EMBEDDINGS_FILE: &str = "embeddings.json";

/// How nearest neighbours are found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenseSearch {
    /// Exact cosine scan over every record
    #[default]
    Flat,
    /// Approximate search over an HNSW graph
    Hnsw,
}

/// Configuration for HNSW index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Maximum number of connections per layer (default: 16)
    pub max_connections: usize,
    /// Size of the dynamic candidate list (default: 200)
    pub ef_construction: usize,
    /// Maximum number of layers (default: 16)
    pub max_layers: u8,
    /// Candidate list size at query time (raised to k when smaller)
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            max_layers: 16,
            ef_search: 30,
        }
    }
}

/// Configuration for the dense retriever
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseConfig {
    pub search: DenseSearch,
    /// Records per embedding request during build
    pub batch_size: usize,
    pub hnsw: HnswConfig,
}

impl Default for DenseConfig {
    fn default() -> Self {
        Self {
            search: DenseSearch::Flat,
            batch_size: 100,
            hnsw: HnswConfig::default(),
        }
    }
}

/// Dense retriever over embedded corpus records
pub struct DenseRetriever {
    records: Vec<CorpusRecord>,
    embeddings: Vec<Embedding>,
    /// Present only in `DenseSearch::Hnsw` mode
    hnsw: Option<Hnsw<'static, f32, DistCosine>>,
    embedder: Arc<dyn Embedder>,
    metadata: IndexMetadata,
    config: DenseConfig,
}

impl std::fmt::Debug for DenseRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseRetriever")
            .field("records", &self.records.len())
            .field("metadata", &self.metadata)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DenseRetriever {
    /// Embed every record and build the index
    ///
    /// An empty corpus yields a valid retriever that answers every query with
    /// no results. Any embedding failure aborts the build.
    pub fn build(
        records: Vec<CorpusRecord>,
        embedder: Arc<dyn Embedder>,
        config: DenseConfig,
    ) -> Result<Self> {
        let batch_size = config.batch_size.max(1);
        let mut embeddings: Vec<Embedding> = Vec::with_capacity(records.len());

        tracing::info!(
            "Building dense index: {} records with {}",
            records.len(),
            embedder.model_name()
        );

        for batch in records.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|r| r.text.as_str()).collect();
            let batch_embeddings = embedder
                .embed_batch(&texts)
                .context("Failed to embed corpus records")?;

            if batch_embeddings.len() != texts.len() {
                anyhow::bail!(
                    "Embedder returned {} vectors for {} records",
                    batch_embeddings.len(),
                    texts.len()
                );
            }

            embeddings.extend(batch_embeddings);
            tracing::info!("Indexing progress: {} / {}", embeddings.len(), records.len());
        }

        Self::from_parts(records, embeddings, embedder, config)
    }

    /// Assemble a retriever from precomputed embeddings
    pub fn from_parts(
        records: Vec<CorpusRecord>,
        embeddings: Vec<Embedding>,
        embedder: Arc<dyn Embedder>,
        config: DenseConfig,
    ) -> Result<Self> {
        if records.len() != embeddings.len() {
            anyhow::bail!(
                "Record count ({}) doesn't match embedding count ({})",
                records.len(),
                embeddings.len()
            );
        }

        let dimension = embeddings
            .first()
            .map(|e| e.len())
            .unwrap_or_else(|| embedder.dimension());

        if let Some(pos) = embeddings.iter().position(|e| e.len() != dimension) {
            anyhow::bail!(
                "Embedding {} has dimension {}, expected {}",
                pos,
                embeddings[pos].len(),
                dimension
            );
        }

        let hnsw = match config.search {
            DenseSearch::Hnsw if !embeddings.is_empty() => {
                let mut hnsw: Hnsw<f32, DistCosine> = Hnsw::new(
                    config.hnsw.max_connections,
                    embeddings.len(),
                    config.hnsw.max_layers as usize,
                    config.hnsw.ef_construction,
                    DistCosine,
                );
                for (idx, embedding) in embeddings.iter().enumerate() {
                    hnsw.insert((embedding.as_slice(), idx));
                }
                hnsw.set_searching_mode(true);
                Some(hnsw)
            }
            _ => None,
        };

        let metadata = IndexMetadata {
            model_name: embedder.model_name().to_string(),
            dimension,
            num_records: records.len(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::debug!(
            "Dense index ready: {} records, {} dimensions, {:?} search",
            records.len(),
            dimension,
            config.search
        );

        Ok(Self {
            records,
            embeddings,
            hnsw,
            embedder,
            metadata,
            config,
        })
    }

    /// Whether `index_dir` holds a saved dense index
    pub fn exists(index_dir: &Path) -> bool {
        index_dir.join(METADATA_FILE).is_file()
    }

    /// Save records, embeddings and metadata so a restart can skip embedding
    pub fn save(&self, index_dir: &Path) -> Result<()> {
        fs::create_dir_all(index_dir).context("Failed to create index directory")?;

        fs::write(
            index_dir.join(RECORDS_FILE),
            serde_json::to_string(&self.records)?,
        )?;
        fs::write(
            index_dir.join(EMBEDDINGS_FILE),
            serde_json::to_string(&self.embeddings)?,
        )?;
        // Metadata last: its presence marks a complete index
        fs::write(
            index_dir.join(METADATA_FILE),
            serde_json::to_string_pretty(&self.metadata)?,
        )?;

        tracing::info!("Dense index saved to {:?}", index_dir);
        Ok(())
    }

    /// Load a saved index without re-embedding the corpus
    ///
    /// Fails when the saved index was built by a different embedding model.
    pub fn load(index_dir: &Path, embedder: Arc<dyn Embedder>, config: DenseConfig) -> Result<Self> {
        tracing::info!("Loading dense index from {:?}", index_dir);

        let metadata_json = fs::read_to_string(index_dir.join(METADATA_FILE))
            .context("Failed to read metadata.json")?;
        let metadata: IndexMetadata = serde_json::from_str(&metadata_json)?;

        // Vectors from another model live in a different space
        if embedder.model_name() != metadata.model_name {
            anyhow::bail!(
                "Index was built with {}, embedder is {}",
                metadata.model_name,
                embedder.model_name()
            );
        }

        let records_json = fs::read_to_string(index_dir.join(RECORDS_FILE))
            .context("Failed to read records.json")?;
        let records: Vec<CorpusRecord> = serde_json::from_str(&records_json)?;

        let embeddings_json = fs::read_to_string(index_dir.join(EMBEDDINGS_FILE))
            .context("Failed to read embeddings.json")?;
        let embeddings: Vec<Embedding> = serde_json::from_str(&embeddings_json)?;

        let mut retriever = Self::from_parts(records, embeddings, embedder, config)?;
        retriever.metadata.created_at = metadata.created_at;
        Ok(retriever)
    }

    /// Get index metadata
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    /// Indexed records in corpus order
    pub fn records(&self) -> &[CorpusRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn flat_search(&self, query: &[f32], top_k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(idx, embedding)| (idx, cosine_similarity(query, embedding)))
            .collect();

        rank_by_score(&mut scored);
        scored.truncate(top_k);
        scored
    }

    fn hnsw_search(
        &self,
        hnsw: &Hnsw<'static, f32, DistCosine>,
        query: &[f32],
        top_k: usize,
    ) -> Vec<(usize, f32)> {
        let ef = self.config.hnsw.ef_search.max(top_k);
        let neighbors: Vec<Neighbour> = hnsw.search(query, top_k, ef);

        let mut scored: Vec<(usize, f32)> = neighbors
            .iter()
            .map(|n| {
                // hnsw_rs reports cosine distance
                let score = 1.0 - n.distance;
                (n.d_id, if score.is_nan() { 0.0 } else { score })
            })
            .collect();

        rank_by_score(&mut scored);
        scored.truncate(top_k);
        scored
    }
}

impl Retriever for DenseRetriever {
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if self.records.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).context("Failed to embed query")?;

        if query_embedding.len() != self.metadata.dimension {
            anyhow::bail!(
                "Query embedding has dimension {}, index expects {}",
                query_embedding.len(),
                self.metadata.dimension
            );
        }

        let ranked = match &self.hnsw {
            Some(hnsw) => self.hnsw_search(hnsw, &query_embedding, top_k),
            None => self.flat_search(&query_embedding, top_k),
        };

        Ok(to_results(&ranked, &self.records))
    }

    fn name(&self) -> &str {
        "dense"
    }
}

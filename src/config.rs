//! Service configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `.env` / process environment. CLI flags are applied last by the caller.

use crate::embedding::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::rag::generator::GenerationConfig;
use crate::retrieval::{DenseConfig, DenseSearch, HnswConfig, HybridConfig, HybridWeights};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix for service-specific environment variables
pub const ENV_PREFIX: &str = "STOCK_RAG_";

/// Credentials and endpoint for the hosted model API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer key; only read from the environment, never written back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL, without the trailing endpoint path
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Retrieval and fusion parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of records placed in the prompt context
    pub top_k: usize,
    pub dense_weight: f32,
    pub sparse_weight: f32,
    /// Each source is asked for `top_k * fetch_multiplier` candidates
    pub fetch_multiplier: usize,
    /// Scale BM25 scores into [0, 1] before fusing
    pub normalize_sparse: bool,
    pub dense_search: DenseSearch,
    pub hnsw: HnswConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            dense_weight: 0.5,
            sparse_weight: 0.5,
            fetch_multiplier: 2,
            normalize_sparse: true,
            dense_search: DenseSearch::Flat,
            hnsw: HnswConfig::default(),
        }
    }
}

/// Market data parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub timeout_secs: u64,
    /// Bank of Korea base rate reported verbatim in every snapshot
    pub bok_rate: String,
    /// Chart API host
    pub base_url: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            bok_rate: "2.50%".to_string(),
            base_url: "https://query1.finance.yahoo.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// JSON array of crawled news articles
    pub corpus_path: PathBuf,
    /// Persisted dense index; reused when present, written after a fresh build
    pub index_dir: Option<PathBuf>,
    /// SQLite embedding cache
    pub embedding_cache: Option<PathBuf>,
    pub api: ApiConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub market: MarketConfig,
    pub server: ServerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data/bigkinds_detailed_result.json"),
            index_dir: Some(PathBuf::from("data/dense_index")),
            embedding_cache: None,
            api: ApiConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            market: MarketConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional TOML file, `.env` and the environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {:?}", path);
        }

        let mut settings = match config_path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;

        Ok(settings)
    }

    /// Parse a TOML settings file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Override fields from environment-style variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.api.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.api.base_url = url;
        }

        if let Some(v) = var("CORPUS_PATH") {
            self.corpus_path = PathBuf::from(v);
        }
        if let Some(v) = var("INDEX_DIR") {
            self.index_dir = optional_path(&v);
        }
        if let Some(v) = var("EMBEDDING_CACHE") {
            self.embedding_cache = optional_path(&v);
        }
        if let Some(v) = var("EMBEDDING_BACKEND") {
            self.embedding.backend = v;
        }
        if let Some(v) = var("EMBEDDING_MODEL") {
            self.embedding.model_name = v;
        }
        if let Some(v) = var("TOP_K") {
            self.retrieval.top_k = parse_var("TOP_K", &v)?;
        }
        if let Some(v) = var("DENSE_WEIGHT") {
            self.retrieval.dense_weight = parse_var("DENSE_WEIGHT", &v)?;
        }
        if let Some(v) = var("SPARSE_WEIGHT") {
            self.retrieval.sparse_weight = parse_var("SPARSE_WEIGHT", &v)?;
        }
        if let Some(v) = var("GENERATION_MODEL") {
            self.generation.model = v;
        }
        if let Some(v) = var("BOK_RATE") {
            self.market.bok_rate = v;
        }
        if let Some(v) = var("ADDR") {
            self.server.addr = v;
        }

        Ok(())
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".to_string()));
        }

        self.hybrid_weights()?;

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn hybrid_weights(&self) -> Result<HybridWeights> {
        HybridWeights::new(self.retrieval.dense_weight, self.retrieval.sparse_weight)
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub fn hybrid_config(&self) -> Result<HybridConfig> {
        Ok(HybridConfig {
            weights: self.hybrid_weights()?,
            fetch_multiplier: self.retrieval.fetch_multiplier.max(1),
            normalize_sparse: self.retrieval.normalize_sparse,
        })
    }

    pub fn dense_config(&self) -> DenseConfig {
        DenseConfig {
            search: self.retrieval.dense_search,
            batch_size: self.embedding.batch_size,
            hnsw: self.retrieval.hnsw.clone(),
        }
    }
}

/// Empty values (and "none") disable an optional path
fn optional_path(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{}{} has invalid value {:?}", ENV_PREFIX, name, value)))
}

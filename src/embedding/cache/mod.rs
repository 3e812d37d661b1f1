//! Persistent embedding cache
//!
//! SQLite-backed store keyed by (text hash, model name). `CachedEmbedder`
//! wraps any backend so rebuilding an index over an unchanged corpus does not
//! pay for the hosted embedding calls again.

use crate::embedding::{Embedder, Embedding};
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Embedding cache backed by SQLite
pub struct EmbeddingCache {
    conn: Mutex<Connection>,
    model_name: String,
}

impl EmbeddingCache {
    /// Create a new embedding cache at the given path
    pub fn new(db_path: &Path, model_name: String) -> Result<Self> {
        let conn = Connection::open(db_path)
            .context(format!("Failed to open cache database: {:?}", db_path))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS embeddings (
                id INTEGER PRIMARY KEY,
                text_hash TEXT NOT NULL,
                model_name TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimension INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(text_hash, model_name)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_text_hash_model
             ON embeddings(text_hash, model_name)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            model_name,
        })
    }

    fn hash_text(text: &str) -> String {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        format!("{:x}", hasher.finish())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|&f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Result<Embedding> {
        if bytes.len() % 4 != 0 {
            anyhow::bail!("Invalid embedding bytes length");
        }

        let mut embedding = Vec::with_capacity(bytes.len() / 4);
        for chunk in bytes.chunks_exact(4) {
            let bytes: [u8; 4] = chunk.try_into()?;
            embedding.push(f32::from_le_bytes(bytes));
        }

        Ok(embedding)
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Embedding cache lock poisoned"))
    }

    /// Get an embedding from the cache
    pub fn get(&self, text: &str) -> Result<Option<Embedding>> {
        let text_hash = Self::hash_text(text);
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT embedding FROM embeddings
             WHERE text_hash = ?1 AND model_name = ?2",
        )?;

        let result = stmt.query_row(params![text_hash, self.model_name], |row| {
            let bytes: Vec<u8> = row.get(0)?;
            Ok(bytes)
        });

        match result {
            Ok(bytes) => Ok(Some(Self::deserialize_embedding(&bytes)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store an embedding in the cache
    pub fn put(&self, text: &str, embedding: &[f32]) -> Result<()> {
        let text_hash = Self::hash_text(text);
        let embedding_bytes = Self::serialize_embedding(embedding);
        let dimension = embedding.len() as i64;
        let created_at = chrono::Utc::now().timestamp();

        self.connection()?.execute(
            "INSERT OR REPLACE INTO embeddings
             (text_hash, model_name, embedding, dimension, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![text_hash, self.model_name, embedding_bytes, dimension, created_at],
        )?;

        Ok(())
    }

    /// Number of cached embeddings for the current model
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self.connection()?.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE model_name = ?1",
            params![self.model_name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Clear all cached embeddings for the current model
    pub fn clear_model(&self) -> Result<usize> {
        let deleted = self.connection()?.execute(
            "DELETE FROM embeddings WHERE model_name = ?1",
            params![self.model_name],
        )?;
        Ok(deleted)
    }
}

/// Embedder decorator that consults an `EmbeddingCache` before the backend
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: EmbeddingCache,
}

impl CachedEmbedder {
    /// Wrap `inner`, caching under its model name
    pub fn open(inner: Arc<dyn Embedder>, db_path: &Path) -> Result<Self> {
        let cache = EmbeddingCache::new(db_path, inner.model_name().to_string())?;
        Ok(Self { inner, cache })
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

impl Embedder for CachedEmbedder {
    /// Single texts are request queries: served from the cache when present,
    /// never written to it
    fn embed(&self, text: &str) -> Result<Embedding> {
        if let Some(embedding) = self.cache.get(text)? {
            return Ok(embedding);
        }

        self.inner.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut results: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<usize> = Vec::new();

        for (idx, text) in texts.iter().enumerate() {
            let cached = self.cache.get(text)?;
            if cached.is_none() {
                missing.push(idx);
            }
            results.push(cached);
        }

        if !missing.is_empty() {
            tracing::debug!(
                "Embedding cache: {} hits, {} misses",
                texts.len() - missing.len(),
                missing.len()
            );

            let to_embed: Vec<&str> = missing.iter().map(|&idx| texts[idx]).collect();
            let computed = self.inner.embed_batch(&to_embed)?;

            for (idx, embedding) in missing.into_iter().zip(computed) {
                self.cache.put(texts[idx], &embedding)?;
                results[idx] = Some(embedding);
            }
        }

        results
            .into_iter()
            .map(|e| e.context("Embedding backend returned too few vectors"))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

//! Sparse retrieval using BM25
//!
//! Keyword search via an in-memory tantivy index.
//!
//! Tokenization policy: tantivy's `default` analyzer, applied identically to
//! records and queries. Text is split on every non-alphanumeric character
//! (Unicode-aware, so Hangul words stay whole), tokens longer than 40 bytes are
//! dropped, and the rest are lowercased. Queries are never parsed as query
//! syntax; each distinct token becomes an optional term clause.

use crate::data::CorpusRecord;
use crate::retrieval::{rank_by_score, to_results, IndexMetadata, Retriever, SearchResult};
use anyhow::{Context, Result};
use std::collections::HashSet;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, INDEXED, STORED, TEXT};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Sparse retriever using BM25 for keyword search
pub struct SparseRetriever {
    index: Index,
    reader: IndexReader,
    record_id_field: Field,
    content_field: Field,
    records: Vec<CorpusRecord>,
    metadata: IndexMetadata,
}

impl SparseRetriever {
    /// Build a BM25 index over the records
    pub fn build(records: Vec<CorpusRecord>) -> Result<Self> {
        tracing::info!("Building BM25 index: {} records", records.len());

        let mut schema_builder = Schema::builder();
        let record_id_field = schema_builder.add_u64_field("record_id", INDEXED | STORED);
        let content_field = schema_builder.add_text_field("content", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);

        // Single indexing thread keeps the whole corpus in one segment
        let mut index_writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .context("Failed to create BM25 index writer")?;

        for (idx, record) in records.iter().enumerate() {
            index_writer.add_document(doc!(
                record_id_field => idx as u64,
                content_field => record.text.as_str(),
            ))?;
        }

        index_writer.commit()?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let metadata = IndexMetadata {
            model_name: "bm25".to_string(),
            dimension: 0, // N/A for sparse retrieval
            num_records: records.len(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::debug!("BM25 index built successfully");

        Ok(Self {
            index,
            reader,
            record_id_field,
            content_field,
            records,
            metadata,
        })
    }

    /// Get index metadata
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Tokenize text exactly as the indexed content was tokenized
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let mut analyzer = self.index.tokenizer_for_field(self.content_field)?;
        let mut stream = analyzer.token_stream(text);

        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        while stream.advance() {
            let token = stream.token().text.clone();
            if seen.insert(token.clone()) {
                tokens.push(token);
            }
        }

        Ok(tokens)
    }

    fn build_query(&self, tokens: &[String]) -> BooleanQuery {
        let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
            .iter()
            .map(|token| {
                let term = Term::from_field_text(self.content_field, token);
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, query)
            })
            .collect();

        BooleanQuery::new(clauses)
    }

    /// BM25 scores of every matching record, ranked
    fn matching(&self, query: &str) -> Result<Vec<(usize, f32)>> {
        let tokens = self.tokenize(query)?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(
            &self.build_query(&tokens),
            &TopDocs::with_limit(self.records.len()),
        )?;

        let mut scored = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: TantivyDocument = searcher.doc(doc_address)?;
            if let Some(record_id) = retrieved_doc
                .get_first(self.record_id_field)
                .and_then(|v| v.as_u64())
            {
                scored.push((record_id as usize, score));
            }
        }

        rank_by_score(&mut scored);
        Ok(scored)
    }
}

impl Retriever for SparseRetriever {
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if self.records.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut ranked = self.matching(query)?;
        ranked.truncate(top_k);

        // Records without any query token score zero, in corpus order
        if ranked.len() < top_k {
            let matched: HashSet<usize> = ranked.iter().map(|&(id, _)| id).collect();
            let missing = top_k - ranked.len();
            ranked.extend(
                (0..self.records.len())
                    .filter(|id| !matched.contains(id))
                    .take(missing)
                    .map(|id| (id, 0.0)),
            );
        }

        tracing::debug!("BM25 returned {} results for {:?}", ranked.len(), query);
        Ok(to_results(&ranked, &self.records))
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

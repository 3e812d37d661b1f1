//! # stock-rag
//!
//! News-driven stock analysis with retrieval-augmented generation.
//!
//! ## Overview
//!
//! Given a stock name and a news snippet, the service retrieves similar past
//! news from a corpus, fetches live market indicators, and asks a hosted
//! language model for a 매수 / 매도 / 중립 decision with reasons.
//!
//! ## Architecture
//!
//! - `data` - Corpus records and loading
//! - `embedding` - Embedding backends and caching
//! - `retrieval` - Dense, sparse, and weighted hybrid retrieval
//! - `market` - Market snapshot fetching
//! - `rag` - Prompt assembly, generation, and the analysis pipeline
//! - `server` - Axum-based REST API
//! - `config` - Layered settings
//! - `cli` - Command-line interface

pub mod cli;
pub mod config;
pub mod data;
pub mod embedding;
pub mod error;
pub mod market;
pub mod rag;
pub mod retrieval;
pub mod server;

// Re-export commonly used types
pub use error::{Error, Result};

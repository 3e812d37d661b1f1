//! Retrieval-augmented stock analysis
//!
//! # Architecture
//!
//! ```text
//! AnalyzeRequest
//!     │
//!     ▼
//! ┌─────────────┐
//! │  Retriever  │  ← hybrid dense + BM25 over past news (skipped for no-rag)
//! └─────────────┘
//!     │
//!     ▼ SearchResults
//! ┌─────────────┐
//! │   Context   │  ← peers + market snapshot + past cases into a template
//! │   Builder   │
//! └─────────────┘
//!     │
//!     ▼ Prompt
//! ┌─────────────┐
//! │  Generator  │  ← hosted chat model
//! └─────────────┘
//!     │
//!     ▼
//! AnalyzeResponse (decision report + referenced cases + market data)
//! ```

pub mod context;
pub mod generator;
pub mod pipeline;
pub mod query;

// Re-exports for convenience
pub use context::{assemble_prompt, related_stocks, PromptInputs, PromptTemplate};
pub use generator::{create_generator, GenerationConfig, Generator, OpenAiGenerator};
pub use pipeline::{AnalysisMode, Analyzer, IndexBuilder, RetrieverHandle};
pub use query::{AnalyzeRequest, AnalyzeResponse, DecisionReport, HealthResponse, ReloadResponse};

//! Context building for analysis prompts
//!
//! Peer lookup, prompt templates and the assembler that combines them with
//! retrieved records and market data.

mod builder;
mod industry;
mod templates;

pub use builder::{assemble_prompt, build_context, PromptInputs};
pub use industry::{related_stocks, DEFAULT_PEERS};
pub use templates::{render, PromptTemplate, NO_RAG_TEMPLATE, RAG_TEMPLATE};

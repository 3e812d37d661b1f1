//! Generator module for text generation
//!
//! Provides a trait-based abstraction over hosted chat models.

pub mod config;
pub mod openai;

pub use config::GenerationConfig;
pub use openai::OpenAiGenerator;

use crate::config::ApiConfig;
use anyhow::Result;
use std::sync::Arc;

/// Trait for text generation models
///
/// Implementations block on network I/O; async callers must go through
/// `spawn_blocking`.
pub trait Generator: Send + Sync {
    /// Generate a response given a prompt
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Factory function for creating generators
pub fn create_generator(config: &GenerationConfig, api: &ApiConfig) -> Result<Arc<dyn Generator>> {
    Ok(Arc::new(OpenAiGenerator::new(config.clone(), api)?))
}

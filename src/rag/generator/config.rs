//! Configuration for text generators

use serde::{Deserialize, Serialize};

/// Configuration for a hosted chat-completion generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat model identifier
    pub model: String,

    /// Temperature (higher = more random, lower = more deterministic)
    /// Range: 0.0 to 2.0, default: 0.7
    pub temperature: f32,

    /// Maximum completion tokens (None = backend default)
    pub max_tokens: Option<u32>,

    /// Request timeout; a timed-out request counts as a failed generation
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

impl GenerationConfig {
    /// Create a new generation config for the given model
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Default::default()
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum completion tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_builder() {
        let config = GenerationConfig::new("gpt-4o")
            .with_temperature(0.2)
            .with_max_tokens(256);

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, Some(256));
        assert_eq!(config.timeout_secs, 60);
    }
}

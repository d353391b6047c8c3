// Generation module
// Answer generation against a text-generation oracle, with failure containment

pub mod cohere;
pub mod ollama;


use std::sync::Arc;

use tracing::{debug, error};

use crate::Result;
use crate::config::{Config, GenerationConfig, ProviderKind};

pub use cohere::CohereGenerator;
pub use ollama::OllamaGenerator;

/// Prefix of the answer returned when the oracle fails
pub const GENERATION_ERROR_PREFIX: &str = "Error generating answer";

/// Sampling settings sent with every generation request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    #[inline]
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for GenerationParams {
    #[inline]
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// A generative model oracle
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Model identifier, used in logs
    fn model(&self) -> &str;
}

/// Turns prompts into answers and never fails: oracle errors become the answer text
pub struct AnswerGenerator {
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(generator: Arc<dyn TextGenerator>, params: GenerationParams) -> Self {
        Self { generator, params }
    }

    #[inline]
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Generate an answer. On failure, returns "Error generating answer: {cause}".
    #[inline]
    pub fn generate(&self, prompt: &str) -> String {
        debug!(
            "Generating answer with {} (prompt length: {}, max tokens: {})",
            self.generator.model(),
            prompt.len(),
            self.params.max_tokens
        );

        match self.generator.generate(prompt, &self.params) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                error!("Answer generation failed: {}", e);
                format!("{}: {}", GENERATION_ERROR_PREFIX, e)
            }
        }
    }
}

/// Build the text generator selected in the configuration
#[inline]
pub fn from_config(config: &Config) -> Result<Arc<dyn TextGenerator>> {
    Ok(match config.provider {
        ProviderKind::Cohere => Arc::new(CohereGenerator::new(config)?),
        ProviderKind::Ollama => Arc::new(OllamaGenerator::new(config)?),
    })
}

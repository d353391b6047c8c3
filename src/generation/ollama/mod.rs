use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationParams, TextGenerator};
use crate::config::Config;
use crate::oracle::HttpOracle;
use crate::{ChatError, Result};

/// Ollama completion client (`/api/generate`, non-streaming)
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    oracle: HttpOracle,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_oracle(
            HttpOracle::ollama(config)?,
            config.ollama.chat_model.clone(),
        ))
    }

    #[inline]
    pub fn with_oracle(oracle: HttpOracle, model: String) -> Self {
        Self { oracle, model }
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: params.max_tokens,
                temperature: params.temperature,
            },
        };

        let response: GenerateResponse = self
            .oracle
            .post_json("/api/generate", &request)
            .context("Failed to call Ollama generate API")
            .map_err(|e| ChatError::Generation(format!("{:#}", e)))?;

        debug!("Ollama returned {} characters", response.response.len());
        Ok(response.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}


use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::{debug, info, warn};

use super::{EmbedMode, EmbeddingProvider};
use crate::config::Config;
use crate::oracle::HttpOracle;
use crate::{ChatError, Result};

/// Ollama embedding client.
///
/// Ollama has no `input_type`, so query mode is expressed with the retrieval prefix the
/// embedding model was trained on. Documents are embedded as-is.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    oracle: HttpOracle,
    model: String,
    query_prefix: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_oracle(
            HttpOracle::ollama(config)?,
            config.ollama.embed_model.clone(),
            config.ollama.query_prefix.clone(),
        ))
    }

    #[inline]
    pub fn with_oracle(oracle: HttpOracle, model: String, query_prefix: String) -> Self {
        Self {
            oracle,
            model,
            query_prefix,
        }
    }

    /// Test connection to the Ollama server and verify the embedding model is pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        self.require_models(&[self.model.as_str()])
    }

    /// Fail unless every named model is pulled on the server
    #[inline]
    pub fn require_models(&self, required: &[&str]) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.oracle.base_url());

        let models = self.list_models()?;
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| !models.iter().any(|m| m.name == *name))
            .collect();

        if missing.is_empty() {
            info!(
                "Health check passed for Ollama server at {} with models {:?}",
                self.oracle.base_url(),
                required
            );
            return Ok(());
        }

        let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!(
            "Models {:?} not found. Available models: {:?}",
            missing, available_models
        );
        Err(ChatError::Embedding(format!(
            "Models {:?} are not available. Available models: {:?}",
            missing, available_models
        )))
    }

    /// List all models pulled on the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response: ModelsResponse = self
            .oracle
            .get_json("/api/tags")
            .context("Failed to fetch models")
            .map_err(|e| ChatError::Network(format!("{:#}", e)))?;

        debug!("Found {} models", response.models.len());
        Ok(response.models)
    }

    fn prepare<'a>(&self, text: &'a str, mode: EmbedMode) -> Cow<'a, str> {
        match mode {
            EmbedMode::Document => Cow::Borrowed(text),
            EmbedMode::Query => Cow::Owned(format!("{}{}", self.query_prefix, text)),
        }
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        debug!(
            "Generating {} embedding for text (length: {})",
            mode,
            text.len()
        );

        let input = self.prepare(text, mode);
        let request = EmbedRequest {
            model: &self.model,
            input: &input,
        };

        let response: EmbedResponse = self
            .oracle
            .post_json("/api/embed", &request)
            .context("Failed to generate embedding")
            .map_err(|e| ChatError::Embedding(format!("{:#}", e)))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::Embedding("Ollama returned no embeddings".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

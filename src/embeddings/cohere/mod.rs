
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{EmbedMode, EmbeddingProvider};
use crate::config::Config;
use crate::oracle::HttpOracle;
use crate::{ChatError, Result};

const EMBED_PATH: &str = "/v2/embed";
const MODELS_PATH: &str = "/v1/models";

/// Cohere embedding client. Sends the mode as `input_type`.
#[derive(Debug, Clone)]
pub struct CohereEmbedder {
    oracle: HttpOracle,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: [&'a str; 1],
    input_type: &'static str,
    embedding_types: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: EmbeddingsByType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsByType {
    float: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

impl CohereEmbedder {
    /// Create a client from configuration. Fails when the API key is missing.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_oracle(
            HttpOracle::cohere(config)?,
            config.cohere.embed_model.clone(),
        ))
    }

    #[inline]
    pub fn with_oracle(oracle: HttpOracle, model: String) -> Self {
        Self { oracle, model }
    }

    /// Verify the API is reachable and the key is accepted
    #[inline]
    pub fn health_check(&self) -> Result<Vec<ModelInfo>> {
        debug!("Performing health check for Cohere at {}", self.oracle.base_url());

        let response: ModelsResponse = self
            .oracle
            .get_json(MODELS_PATH)
            .context("Failed to list Cohere models")
            .map_err(|e| ChatError::Network(format!("{:#}", e)))?;

        info!(
            "Health check passed for Cohere at {} ({} models visible)",
            self.oracle.base_url(),
            response.models.len()
        );
        Ok(response.models)
    }
}

impl EmbeddingProvider for CohereEmbedder {
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        debug!(
            "Generating {} embedding for text (length: {})",
            mode,
            text.len()
        );

        let request = EmbedRequest {
            model: &self.model,
            texts: [text],
            input_type: mode.input_type(),
            embedding_types: ["float"],
        };

        let response: EmbedResponse = self
            .oracle
            .post_json(EMBED_PATH, &request)
            .context("Failed to generate embedding")
            .map_err(|e| ChatError::Embedding(format!("{:#}", e)))?;

        response
            .embeddings
            .float
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::Embedding("Cohere returned no embeddings".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

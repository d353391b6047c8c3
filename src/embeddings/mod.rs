// Embeddings module
// Chunking of document text and the asymmetric embedding providers

pub mod chunking;
pub mod cohere;
pub mod ollama;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::Result;
use crate::config::{Config, ProviderKind};

pub use chunking::{DEFAULT_CHUNK_SIZE, TextChunk, chunk_document, chunk_text};
pub use cohere::CohereEmbedder;
pub use ollama::OllamaEmbedder;

/// Whether text is being embedded for storage or for searching.
///
/// Retrieval models encode the two differently, so stored chunks and queries must
/// never share a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedMode {
    Document,
    Query,
}

impl EmbedMode {
    /// The `input_type` value understood by asymmetric embedding APIs
    #[inline]
    pub const fn input_type(self) -> &'static str {
        match self {
            Self::Document => "search_document",
            Self::Query => "search_query",
        }
    }
}

impl fmt::Display for EmbedMode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.input_type())
    }
}

/// Maps text to a fixed-length vector
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>>;

    /// Model identifier, used in logs
    fn model(&self) -> &str;
}

/// Embed text, absorbing provider failures.
///
/// Returns `None` when the provider errors or returns a vector whose length differs
/// from `expected_dimension`; the cause is logged.
#[inline]
pub fn try_embed(
    provider: &dyn EmbeddingProvider,
    text: &str,
    mode: EmbedMode,
    expected_dimension: usize,
) -> Option<Vec<f32>> {
    match provider.embed(text, mode) {
        Ok(vector) if vector.len() == expected_dimension => {
            debug!(
                "Embedded {} chars as {} with {}",
                text.len(),
                mode,
                provider.model()
            );
            Some(vector)
        }
        Ok(vector) => {
            warn!(
                "Embedding from {} has {} dimensions, expected {}",
                provider.model(),
                vector.len(),
                expected_dimension
            );
            None
        }
        Err(e) => {
            warn!("Error generating {} embedding: {}", mode, e);
            None
        }
    }
}

/// Build the embedding provider selected in the configuration
#[inline]
pub fn from_config(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(match config.provider {
        ProviderKind::Cohere => Arc::new(CohereEmbedder::new(config)?),
        ProviderKind::Ollama => Arc::new(OllamaEmbedder::new(config)?),
    })
}

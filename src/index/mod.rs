// Vector index
// Similarity-searchable storage of chunk embeddings, volatile or on disk

pub mod lance;
pub mod memory;


use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Result;
use crate::config::{Config, IndexBackend};

pub use lance::LanceIndex;
pub use memory::MemoryIndex;

/// Similarity metric of a collection. Only cosine is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
}

impl fmt::Display for Distance {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => f.write_str("cosine"),
        }
    }
}

/// Name, dimension and metric of a collection; all fixed at creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub distance: Distance,
}

impl CollectionSpec {
    #[inline]
    pub fn cosine(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            distance: Distance::Cosine,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::cosine(
            config.index.collection.clone(),
            config.index.dimension as usize,
        )
    }
}

/// What is stored next to each vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
    pub document_id: String,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// RFC 3339 timestamp
    pub ingested_at: String,
}

impl ChunkPayload {
    /// Payload stamped with the current time
    #[inline]
    pub fn new(text: impl Into<String>, document_id: impl Into<String>, chunk_index: u32) -> Self {
        Self {
            text: text.into(),
            document_id: document_id.into(),
            chunk_index,
            ingested_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A stored record matched by a search, with its cosine similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPayload {
    pub id: String,
    pub payload: ChunkPayload,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist. Returns `true` when it was created.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool>;

    /// Store a new record under a fresh identifier and return that identifier.
    ///
    /// Existing records are never overwritten. A vector whose length differs from the
    /// collection dimension is rejected.
    async fn upsert(
        &self,
        collection: &str,
        vector: Vec<f32>,
        payload: ChunkPayload,
    ) -> Result<String>;

    /// Up to `limit` records by descending similarity; equal scores keep insertion order
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPayload>>;

    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Cosine similarity of two vectors; 0.0 when either is zero or the lengths differ
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

/// Fresh record identifier: UUID v4 as 32 hex characters
#[inline]
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Open the index backend selected in the configuration
#[inline]
pub async fn from_config(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    match config.index.backend {
        IndexBackend::Memory => {
            info!("Using in-memory vector index");
            Ok(Arc::new(MemoryIndex::new()))
        }
        IndexBackend::Lancedb => {
            let path = config.vector_database_path();
            info!("Using LanceDB vector index at {}", path.display());
            Ok(Arc::new(LanceIndex::open(&path).await?))
        }
    }
}

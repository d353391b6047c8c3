
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{ChunkPayload, CollectionSpec, ScoredPayload, VectorIndex, cosine_similarity, new_record_id};
use crate::{ChatError, Result};

struct StoredRecord {
    id: String,
    vector: Vec<f32>,
    payload: ChunkPayload,
}

struct Collection {
    spec: CollectionSpec,
    /// Insertion order
    records: Vec<StoredRecord>,
}

/// Volatile index held in process memory. Lost when the process exits.
#[derive(Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing_collection(name: &str) -> ChatError {
    ChatError::Database(format!("Collection '{}' does not exist", name))
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(&spec.name) {
            debug!("Collection '{}' already exists", spec.name);
            return Ok(false);
        }

        collections.insert(
            spec.name.clone(),
            Collection {
                spec: spec.clone(),
                records: Vec::new(),
            },
        );
        info!(
            "Created collection '{}' ({} dimensions, {})",
            spec.name, spec.dimension, spec.distance
        );
        Ok(true)
    }

    async fn upsert(
        &self,
        collection: &str,
        vector: Vec<f32>,
        payload: ChunkPayload,
    ) -> Result<String> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;

        if vector.len() != target.spec.dimension {
            return Err(ChatError::Database(format!(
                "Vector has {} dimensions but collection '{}' expects {}",
                vector.len(),
                collection,
                target.spec.dimension
            )));
        }

        let id = new_record_id();
        target.records.push(StoredRecord {
            id: id.clone(),
            vector,
            payload,
        });
        debug!("Stored record {} in '{}'", id, collection);
        Ok(id)
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPayload>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;

        let mut scored: Vec<ScoredPayload> = target
            .records
            .iter()
            .map(|record| ScoredPayload {
                id: record.id.clone(),
                payload: record.payload.clone(),
                score: cosine_similarity(query, &record.vector),
            })
            .collect();

        // Stable, so equal scores stay in insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);

        debug!(
            "Search in '{}' returned {} of {} records",
            collection,
            scored.len(),
            target.records.len()
        );
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.records.len())
            .ok_or_else(|| missing_collection(collection))
    }
}

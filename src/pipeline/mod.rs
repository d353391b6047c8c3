// RAG pipeline
// Ingests a document into the vector index and answers questions about it with
// retrieved context and recent conversation

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::classifier::{TaskIntent, classify};
use crate::config::{Config, RetrievalConfig};
use crate::conversation::{ConversationMemory, ConversationTurn};
use crate::document::Document;
use crate::embeddings::{self, EmbedMode, EmbeddingProvider, chunk_document, try_embed};
use crate::generation::{self, AnswerGenerator, GenerationParams};
use crate::index::{self, ChunkPayload, CollectionSpec, ScoredPayload, VectorIndex};
use crate::prompt::PromptBuilder;

/// What happened to one chunk during ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChunkOutcome {
    Indexed { position: usize, record_id: String },
    Dropped { position: usize, reason: String },
}

impl ChunkOutcome {
    #[inline]
    pub const fn position(&self) -> usize {
        match self {
            Self::Indexed { position, .. } | Self::Dropped { position, .. } => *position,
        }
    }

    #[inline]
    pub const fn is_indexed(&self) -> bool {
        matches!(self, Self::Indexed { .. })
    }
}

/// Per-chunk result of ingesting one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    pub document_id: String,
    pub outcomes: Vec<ChunkOutcome>,
}

impl IngestionSummary {
    #[inline]
    pub fn total_chunks(&self) -> usize {
        self.outcomes.len()
    }

    #[inline]
    pub fn indexed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_indexed()).count()
    }

    #[inline]
    pub fn dropped_count(&self) -> usize {
        self.total_chunks() - self.indexed_count()
    }
}

/// An answer and how it was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub intent: TaskIntent,
    /// Number of retrieved chunks that went into the prompt
    pub context_chunks: usize,
}

/// The document a session is currently chatting about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    pub id: String,
    pub name: String,
}

/// Per-user conversation state. Owned by the caller; the pipeline only borrows it.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    memory: ConversationMemory,
    active_document: Option<ActiveDocument>,
}

impl ChatSession {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    #[inline]
    pub fn history(&self) -> &[ConversationTurn] {
        self.memory.full_history()
    }

    #[inline]
    pub fn active_document(&self) -> Option<&ActiveDocument> {
        self.active_document.as_ref()
    }
}

/// Chunk, embed and index documents; retrieve, prompt and generate answers
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: AnswerGenerator,
    prompt: PromptBuilder,
    retrieval: RetrievalConfig,
    collection: CollectionSpec,
}

impl RagPipeline {
    /// Assemble a pipeline from its services and make sure the collection exists
    #[inline]
    pub async fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: AnswerGenerator,
        retrieval: RetrievalConfig,
        collection: CollectionSpec,
    ) -> Result<Self> {
        if index.ensure_collection(&collection).await? {
            info!("Initialized collection '{}'", collection.name);
        }

        Ok(Self {
            embedder,
            index,
            generator,
            prompt: PromptBuilder::new(retrieval.context_char_budget),
            retrieval,
            collection,
        })
    }

    /// Build every service from configuration. Fails on a missing credential or an
    /// unreachable index, before any question is asked.
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let embedder = embeddings::from_config(config)?;
        let text_generator = generation::from_config(config)?;
        let index = index::from_config(config).await?;
        let generator =
            AnswerGenerator::new(text_generator, GenerationParams::from(&config.generation));

        Self::new(
            embedder,
            index,
            generator,
            config.retrieval.clone(),
            CollectionSpec::from_config(config),
        )
        .await
    }

    #[inline]
    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    /// Records currently stored in the collection
    #[inline]
    pub async fn indexed_records(&self) -> Result<usize> {
        self.index.count(&self.collection.name).await
    }

    #[inline]
    pub async fn ingest(&self, session: &mut ChatSession, document: &Document) -> IngestionSummary {
        self.ingest_with_progress(session, document, |_, _| {}).await
    }

    /// Ingest a document, reporting each chunk's outcome and the total chunk count as
    /// they happen. Nothing is retried here; a failed chunk is dropped with its reason.
    #[inline]
    pub async fn ingest_with_progress<F>(
        &self,
        session: &mut ChatSession,
        document: &Document,
        mut on_chunk: F,
    ) -> IngestionSummary
    where
        F: FnMut(&ChunkOutcome, usize) + Send,
    {
        let chunks = chunk_document(&document.text, self.retrieval.chunk_size);
        let total = chunks.len();
        info!(
            "Ingesting {} ({} chunks) into '{}'",
            document.name, total, self.collection.name
        );

        let mut outcomes = Vec::with_capacity(total);
        for chunk in chunks {
            let outcome = self.index_chunk(document, chunk.position, chunk.text).await;
            on_chunk(&outcome, total);
            outcomes.push(outcome);
        }

        session.active_document = Some(ActiveDocument {
            id: document.id.clone(),
            name: document.name.clone(),
        });

        let summary = IngestionSummary {
            document_id: document.id.clone(),
            outcomes,
        };
        info!(
            "Ingested {}: {} chunks indexed, {} dropped",
            document.name,
            summary.indexed_count(),
            summary.dropped_count()
        );
        summary
    }

    async fn index_chunk(&self, document: &Document, position: usize, text: String) -> ChunkOutcome {
        let Some(vector) = try_embed(
            self.embedder.as_ref(),
            &text,
            EmbedMode::Document,
            self.collection.dimension,
        ) else {
            return ChunkOutcome::Dropped {
                position,
                reason: "embedding failed".to_string(),
            };
        };

        let chunk_index = u32::try_from(position).unwrap_or(u32::MAX);
        let payload = ChunkPayload::new(text, document.id.clone(), chunk_index);

        match self
            .index
            .upsert(&self.collection.name, vector, payload)
            .await
        {
            Ok(record_id) => ChunkOutcome::Indexed {
                position,
                record_id,
            },
            Err(e) => {
                warn!("Failed to store chunk {} of {}: {}", position, document.name, e);
                ChunkOutcome::Dropped {
                    position,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Top-k chunks for a question. Embedding or search failures yield no chunks.
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Vec<ScoredPayload> {
        let Some(query) = try_embed(
            self.embedder.as_ref(),
            question,
            EmbedMode::Query,
            self.collection.dimension,
        ) else {
            return Vec::new();
        };

        match self
            .index
            .search(&self.collection.name, &query, self.retrieval.top_k)
            .await
        {
            Ok(results) => {
                debug!(
                    "Retrieved {} chunks (best score: {:?})",
                    results.len(),
                    results.first().map(|r| r.score)
                );
                results
            }
            Err(e) => {
                warn!("Search failed, answering without document context: {}", e);
                Vec::new()
            }
        }
    }

    /// Answer one question and record the turn in the session.
    ///
    /// Never fails: retrieval problems leave the context empty and generation problems
    /// become the answer text. The question is trimmed for classification, retrieval and
    /// the prompt; history keeps it as asked.
    #[inline]
    pub async fn ask(&self, session: &mut ChatSession, asked: &str) -> Answer {
        let question = asked.trim();
        let intent = classify(question);

        let retrieved = if question.is_empty() {
            Vec::new()
        } else {
            self.retrieve(question).await
        };
        let texts: Vec<&str> = retrieved.iter().map(|r| r.payload.text.as_str()).collect();

        let prompt = self.prompt.build(
            intent.instruction(),
            &texts,
            session.memory.recent_window(self.retrieval.history_window),
            question,
        );
        debug!("Task intent: {}, prompt length: {}", intent, prompt.len());

        let text = self.generator.generate(&prompt);
        session.memory.append(asked, text.clone());

        Answer {
            text,
            intent,
            context_chunks: retrieved.len(),
        }
    }
}

use std::sync::Mutex;

use super::*;
use crate::ChatError;
use crate::index::MemoryIndex;
use crate::prompt::NO_CONTEXT_PLACEHOLDER;

const DIMENSION: usize = 16;

/// Bag-of-words embedder: each word bumps one bucket. Texts containing "FAIL" error.
struct BagOfWordsEmbedder {
    modes: Mutex<Vec<EmbedMode>>,
}

impl BagOfWordsEmbedder {
    fn new() -> Self {
        Self {
            modes: Mutex::new(Vec::new()),
        }
    }

    fn modes(&self) -> Vec<EmbedMode> {
        self.modes.lock().expect("lock").clone()
    }
}

impl EmbeddingProvider for BagOfWordsEmbedder {
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        self.modes.lock().expect("lock").push(mode);
        if text.contains("FAIL") {
            return Err(ChatError::Embedding("scripted failure".to_string()));
        }

        let mut vector = vec![0.0; DIMENSION];
        for word in text.split_whitespace() {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(0_usize, |acc, b| acc.wrapping_mul(31).wrapping_add(usize::from(b)))
                % DIMENSION;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }

    fn model(&self) -> &str {
        "bag-of-words"
    }
}

/// Records every prompt; answers with a fixed reply or fails
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
    reply: Option<String>,
}

impl RecordingGenerator {
    fn answering(reply: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply: Some(reply.to_string()),
        }
    }

    fn failing() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply: None,
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock").clone()
    }
}

impl generation::TextGenerator for RecordingGenerator {
    fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| ChatError::Generation("quota exceeded".to_string()))
    }

    fn model(&self) -> &str {
        "recording"
    }
}

struct Harness {
    pipeline: RagPipeline,
    embedder: Arc<BagOfWordsEmbedder>,
    generator: Arc<RecordingGenerator>,
}

async fn harness_with(generator: RecordingGenerator, retrieval: RetrievalConfig) -> Harness {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let generator = Arc::new(generator);
    let pipeline = RagPipeline::new(
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        Arc::new(MemoryIndex::new()),
        AnswerGenerator::new(
            Arc::clone(&generator) as Arc<dyn generation::TextGenerator>,
            GenerationParams::default(),
        ),
        retrieval,
        CollectionSpec::cosine("text_embeddings", DIMENSION),
    )
    .await
    .expect("pipeline should build");

    Harness {
        pipeline,
        embedder,
        generator,
    }
}

async fn harness() -> Harness {
    harness_with(
        RecordingGenerator::answering("  A grounded answer.  "),
        RetrievalConfig::default(),
    )
    .await
}

fn small_chunks() -> RetrievalConfig {
    RetrievalConfig {
        chunk_size: 4,
        ..RetrievalConfig::default()
    }
}

#[tokio::test]
async fn empty_index_prompt_uses_placeholder() {
    let h = harness().await;
    let mut session = ChatSession::new();

    let answer = h.pipeline.ask(&mut session, "What is this about?").await;

    assert_eq!(answer.text, "A grounded answer.");
    assert_eq!(answer.intent, TaskIntent::General);
    assert_eq!(answer.context_chunks, 0);

    let prompts = h.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(NO_CONTEXT_PLACEHOLDER));
    assert!(prompts[0].contains("User question: What is this about?"));
}

#[tokio::test]
async fn ingest_indexes_every_chunk_and_sets_active_document() {
    let h = harness_with(RecordingGenerator::answering("ok"), small_chunks()).await;
    let mut session = ChatSession::new();
    let document = Document::from_text("notes.txt", "one two three four five six seven eight nine");

    let summary = h.pipeline.ingest(&mut session, &document).await;

    assert_eq!(summary.document_id, document.id);
    assert_eq!(summary.total_chunks(), 3);
    assert_eq!(summary.indexed_count(), 3);
    assert_eq!(summary.dropped_count(), 0);
    assert_eq!(
        summary.outcomes.iter().map(ChunkOutcome::position).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(h.pipeline.indexed_records().await.expect("count"), 3);
    assert!(h.embedder.modes().iter().all(|m| *m == EmbedMode::Document));

    let active = session.active_document().expect("active document set");
    assert_eq!(active.id, document.id);
    assert_eq!(active.name, "notes.txt");
}

#[tokio::test]
async fn partial_embedding_failure_reports_exact_counts() {
    let h = harness_with(RecordingGenerator::answering("ok"), small_chunks()).await;
    let mut session = ChatSession::new();
    let document = Document::from_text(
        "mixed.txt",
        "alpha beta gamma delta FAIL here and there epsilon zeta eta theta",
    );

    let summary = h.pipeline.ingest(&mut session, &document).await;

    assert_eq!(summary.total_chunks(), 3);
    assert_eq!(summary.indexed_count(), 2);
    assert_eq!(summary.dropped_count(), 1);
    assert!(matches!(
        &summary.outcomes[1],
        ChunkOutcome::Dropped { position: 1, .. }
    ));
    assert_eq!(h.pipeline.indexed_records().await.expect("count"), 2);
}

#[tokio::test]
async fn blank_document_yields_no_chunks() {
    let h = harness().await;
    let mut session = ChatSession::new();
    let summary = h
        .pipeline
        .ingest(&mut session, &Document::from_text("blank.txt", "  \n\t "))
        .await;

    assert_eq!(summary.total_chunks(), 0);
    assert_eq!(h.pipeline.indexed_records().await.expect("count"), 0);
}

#[tokio::test]
async fn progress_callback_sees_every_outcome() {
    let h = harness_with(RecordingGenerator::answering("ok"), small_chunks()).await;
    let mut session = ChatSession::new();
    let document = Document::from_text("doc.txt", "a b c d e f g h i j");

    let mut seen = Vec::new();
    h.pipeline
        .ingest_with_progress(&mut session, &document, |outcome, total| {
            seen.push((outcome.position(), total));
        })
        .await;

    assert_eq!(seen, vec![(0, 3), (1, 3), (2, 3)]);
}

#[tokio::test]
async fn retrieved_chunk_reaches_the_prompt() {
    let h = harness_with(RecordingGenerator::answering("ok"), small_chunks()).await;
    let mut session = ChatSession::new();
    let document = Document::from_text(
        "animals.txt",
        "cats purr softly indoors dogs bark loudly outside",
    );
    h.pipeline.ingest(&mut session, &document).await;

    let answer = h.pipeline.ask(&mut session, "dogs bark loudly outside").await;

    assert!(answer.context_chunks > 0);
    let prompt = h.generator.prompts().pop().expect("one prompt");
    let (_, context) = prompt
        .split_once("Document context:\n")
        .expect("context block");
    assert!(context.starts_with("dogs bark loudly outside"));
    assert_eq!(h.embedder.modes().last(), Some(&EmbedMode::Query));
}

#[tokio::test]
async fn round_trip_search_scores_near_one() {
    let h = harness().await;
    let mut session = ChatSession::new();
    let document = Document::from_text("one.txt", "the quick brown fox");
    h.pipeline.ingest(&mut session, &document).await;

    let results = h.pipeline.retrieve("the quick brown fox").await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].payload.text, "the quick brown fox");
    assert_eq!(results[0].payload.document_id, document.id);
    assert!(results[0].score >= 0.99);
}

#[tokio::test]
async fn generator_failure_becomes_the_answer_and_is_remembered() {
    let h = harness_with(RecordingGenerator::failing(), RetrievalConfig::default()).await;
    let mut session = ChatSession::new();

    let answer = h.pipeline.ask(&mut session, "Explain the results").await;
    assert!(answer.text.starts_with("Error generating answer: "));
    assert!(answer.text.contains("quota exceeded"));
    assert_eq!(answer.intent, TaskIntent::Explain);

    let history = session.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].question, "Explain the results");
    assert_eq!(history[0].answer, answer.text);

    // The pipeline keeps working after a failure
    let second = h.pipeline.ask(&mut session, "Summarize it").await;
    assert_eq!(second.intent, TaskIntent::Summarize);
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn query_embedding_failure_gives_empty_context() {
    let h = harness().await;
    let mut session = ChatSession::new();
    h.pipeline
        .ingest(&mut session, &Document::from_text("a.txt", "some indexed text"))
        .await;

    let answer = h.pipeline.ask(&mut session, "FAIL on purpose").await;
    assert_eq!(answer.context_chunks, 0);
    assert!(h.generator.prompts()[0].contains(NO_CONTEXT_PLACEHOLDER));
}

#[tokio::test]
async fn empty_question_skips_embedding_and_search() {
    let h = harness().await;
    let mut session = ChatSession::new();

    let answer = h.pipeline.ask(&mut session, "   ").await;

    assert!(h.embedder.modes().is_empty());
    assert_eq!(answer.context_chunks, 0);
    assert_eq!(answer.intent, TaskIntent::General);
    assert!(h.generator.prompts()[0].contains(NO_CONTEXT_PLACEHOLDER));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn history_keeps_the_question_as_asked() {
    let h = harness().await;
    let mut session = ChatSession::new();

    h.pipeline.ask(&mut session, "  what is alpha?\n").await;

    assert_eq!(session.history()[0].question, "  what is alpha?\n");
    assert!(h.generator.prompts()[0].contains("User question: what is alpha?"));
    assert_eq!(h.embedder.modes(), vec![EmbedMode::Query]);
}

#[tokio::test]
async fn prompt_only_sees_the_recent_window() {
    let h = harness().await;
    let mut session = ChatSession::new();

    for turn in 1..=7 {
        h.pipeline
            .ask(&mut session, &format!("question number {}", turn))
            .await;
    }

    assert_eq!(session.history().len(), 7);
    let last_prompt = h.generator.prompts().pop().expect("prompts recorded");
    assert!(!last_prompt.contains("User: question number 1\n"));
    assert!(last_prompt.contains("User: question number 2\n"));
    assert!(last_prompt.contains("User: question number 6\n"));
    assert!(last_prompt.contains("User question: question number 7"));
}

use super::*;
use crate::ChatError;

struct FixedEmbedder {
    vector: Vec<f32>,
}

impl EmbeddingProvider for FixedEmbedder {
    fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }

    fn model(&self) -> &str {
        "fixed"
    }
}

struct BrokenEmbedder;

impl EmbeddingProvider for BrokenEmbedder {
    fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
        Err(ChatError::Embedding("provider unreachable".to_string()))
    }

    fn model(&self) -> &str {
        "broken"
    }
}

#[test]
fn modes_map_to_distinct_input_types() {
    assert_eq!(EmbedMode::Document.input_type(), "search_document");
    assert_eq!(EmbedMode::Query.input_type(), "search_query");
    assert_ne!(
        EmbedMode::Document.input_type(),
        EmbedMode::Query.input_type()
    );
    assert_eq!(EmbedMode::Query.to_string(), "search_query");
}

#[test]
fn try_embed_passes_through_matching_vectors() {
    let provider = FixedEmbedder {
        vector: vec![0.1, 0.2, 0.3],
    };
    let vector = try_embed(&provider, "text", EmbedMode::Document, 3);
    assert_eq!(vector, Some(vec![0.1, 0.2, 0.3]));
}

#[test]
fn try_embed_rejects_dimension_mismatch() {
    let provider = FixedEmbedder {
        vector: vec![0.1, 0.2],
    };
    assert_eq!(try_embed(&provider, "text", EmbedMode::Query, 3), None);
}

#[test]
fn try_embed_absorbs_provider_errors() {
    assert_eq!(try_embed(&BrokenEmbedder, "text", EmbedMode::Query, 3), None);
}

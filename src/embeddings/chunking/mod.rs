
use tracing::debug;

/// Words per chunk when no size is configured
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// A bounded run of consecutive document words, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk within the document, starting at 0
    pub position: usize,
    /// The chunk's words joined by single spaces
    pub text: String,
    /// Number of words in the chunk
    pub word_count: usize,
}

/// Split text into consecutive, non-overlapping windows of `size` words.
///
/// Whitespace-only input yields no chunks. Joining the result with single spaces
/// reproduces [`normalize_whitespace`] of the input. A `size` of zero is treated as one.
#[inline]
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(size.max(1))
        .map(|window| window.join(" "))
        .collect()
}

/// Chunk a document and keep each chunk's position and word count
#[inline]
pub fn chunk_document(text: &str, size: usize) -> Vec<TextChunk> {
    let chunks: Vec<TextChunk> = chunk_text(text, size)
        .into_iter()
        .enumerate()
        .map(|(position, text)| TextChunk {
            position,
            word_count: text.split(' ').count(),
            text,
        })
        .collect();

    debug!(
        "Chunked document into {} chunks of up to {} words",
        chunks.len(),
        size.max(1)
    );

    chunks
}

/// Collapse every whitespace run to a single space and trim the ends
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

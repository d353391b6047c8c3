
use serde::{Deserialize, Serialize};

/// Number of prior turns shown to the model by default
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// One question and the answer given to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// Append-only record of a session's turns.
///
/// The full history is kept for display; prompts only ever see a trailing window of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
}

impl ConversationMemory {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(ConversationTurn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// The last `n` turns, oldest first
    #[inline]
    pub fn recent_window(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Every turn, oldest first
    #[inline]
    pub fn full_history(&self) -> &[ConversationTurn] {
        &self.turns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

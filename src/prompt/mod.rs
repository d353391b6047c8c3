// Prompt assembly
// Builds the single instruction sent to the generation oracle, plus the starter
// questions offered to a user who has just uploaded a document


use rand::Rng;
use rand::seq::IndexedRandom;

use crate::conversation::ConversationTurn;

/// Character budget for the document context block
pub const DEFAULT_CONTEXT_CHAR_BUDGET: usize = 2000;

/// Stands in for the context block when retrieval found nothing
pub const NO_CONTEXT_PLACEHOLDER: &str = "No relevant document context found.";

/// Starter questions offered after a document is loaded
pub const SUGGESTED_QUESTIONS: &[&str] = &[
    "What is the main idea of this document?",
    "Can you summarize this document in a few sentences?",
    "What are the key points mentioned in this document?",
    "Does this document discuss any important events?",
    "What are the conclusions drawn in this document?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    context_char_budget: usize,
}

impl Default for PromptBuilder {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_CHAR_BUDGET)
    }
}

impl PromptBuilder {
    #[inline]
    pub const fn new(context_char_budget: usize) -> Self {
        Self {
            context_char_budget,
        }
    }

    #[inline]
    pub const fn context_char_budget(&self) -> usize {
        self.context_char_budget
    }

    /// Assemble the prompt: prior conversation, document context, task, question.
    ///
    /// `retrieved` must be in ranking order; it is joined with single spaces and cut to
    /// the character budget.
    #[inline]
    pub fn build<S: AsRef<str>>(
        &self,
        instruction: &str,
        retrieved: &[S],
        window: &[ConversationTurn],
        question: &str,
    ) -> String {
        let history = format_history(window);
        let context = self.document_context(retrieved);

        format!(
            "You are an AI assistant with memory and document retrieval capabilities.\n\
             Use past conversations and document context to generate the best response.\n\
             \n\
             Previous conversation:\n\
             {history}\n\
             \n\
             Document context:\n\
             {context}\n\
             \n\
             Task: {instruction}\n\
             \n\
             User question: {question}\n\
             \n\
             Answer:\n"
        )
    }

    /// Joined and truncated retrieval text, or the placeholder when nothing was retrieved
    #[inline]
    pub fn document_context<S: AsRef<str>>(&self, retrieved: &[S]) -> String {
        if retrieved.is_empty() {
            return NO_CONTEXT_PLACEHOLDER.to_string();
        }

        let joined = retrieved
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");

        truncate_chars(&joined, self.context_char_budget)
    }
}

/// Keep at most `limit` characters. Cuts on `char` boundaries, never mid-codepoint.
#[inline]
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Serialize turns oldest first as `User:` / `AI:` line pairs
#[inline]
pub fn format_history(window: &[ConversationTurn]) -> String {
    window
        .iter()
        .map(|turn| format!("User: {}\nAI: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pick one of [`SUGGESTED_QUESTIONS`] using the given random source
#[inline]
pub fn suggest_question<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    SUGGESTED_QUESTIONS
        .choose(rng)
        .copied()
        .unwrap_or(SUGGESTED_QUESTIONS[0])
}

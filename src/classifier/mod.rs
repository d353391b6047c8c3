// Task classification
// Maps a question to the kind of answer the user is asking for


use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskIntent {
    Summarize,
    Explain,
    Compare,
    General,
}

/// Keyword rules in priority order. The first keyword found in the query wins.
const RULES: &[(&str, TaskIntent)] = &[
    ("summarize", TaskIntent::Summarize),
    ("explain", TaskIntent::Explain),
    ("compare", TaskIntent::Compare),
];

impl TaskIntent {
    /// Instruction placed in the prompt's task line
    #[inline]
    pub const fn instruction(self) -> &'static str {
        match self {
            Self::Summarize => "Summarize the document in detail.",
            Self::Explain => "Provide a clear explanation.",
            Self::Compare => "Compare the relevant concepts.",
            Self::General => "Answer concisely and informatively.",
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Explain => "explain",
            Self::Compare => "compare",
            Self::General => "general",
        }
    }
}

impl fmt::Display for TaskIntent {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a query by case-insensitive keyword match
#[inline]
pub fn classify(query: &str) -> TaskIntent {
    let query = query.to_lowercase();
    RULES
        .iter()
        .find(|(keyword, _)| query.contains(keyword))
        .map_or(TaskIntent::General, |&(_, intent)| intent)
}

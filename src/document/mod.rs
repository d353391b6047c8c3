// Document loading
// Turns an uploaded file into the text blob the pipeline ingests


use std::fs;
use std::path::Path;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{ChatError, Result};

const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown"];

/// A document's text and identity for one chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Unique identity, stored with every chunk of this document
    pub id: String,
    /// Display name, usually the file name
    pub name: String,
    pub text: String,
}

impl Document {
    #[inline]
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            text: text.into(),
        }
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Load a UTF-8 text document from disk.
///
/// Only plain-text formats are read; anything else, including PDF, is a document error.
#[inline]
pub fn load_document(path: &Path) -> Result<Document> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();

    if !extension.is_empty()
        && !TEXT_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension))
    {
        return Err(ChatError::Document(format!(
            "Unsupported document type '.{}' for {} (expected one of: {})",
            extension,
            path.display(),
            TEXT_EXTENSIONS.join(", ")
        )));
    }

    debug!("Reading document from {}", path.display());
    let bytes = fs::read(path)?;
    let text = decode_text(&bytes)
        .map_err(|e| ChatError::Document(format!("{}: {}", path.display(), e)))?;

    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    info!(
        "Loaded document {} ({} bytes, {} words)",
        name,
        bytes.len(),
        text.split_whitespace().count()
    );

    Ok(Document::from_text(name, text))
}

fn decode_text(bytes: &[u8]) -> std::result::Result<String, String> {
    if bytes.contains(&0) {
        return Err("file looks binary, not text".to_string());
    }

    String::from_utf8(bytes.to_vec()).map_err(|e| format!("file is not valid UTF-8: {}", e))
}

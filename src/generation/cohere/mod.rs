use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationParams, TextGenerator};
use crate::config::Config;
use crate::oracle::HttpOracle;
use crate::{ChatError, Result};

const CHAT_PATH: &str = "/v2/chat";

/// Cohere chat client, used as a single-turn completion endpoint
#[derive(Debug, Clone)]
pub struct CohereGenerator {
    oracle: HttpOracle,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl CohereGenerator {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_oracle(
            HttpOracle::cohere(config)?,
            config.cohere.chat_model.clone(),
        ))
    }

    #[inline]
    pub fn with_oracle(oracle: HttpOracle, model: String) -> Self {
        Self { oracle, model }
    }
}

impl TextGenerator for CohereGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let response: ChatResponse = self
            .oracle
            .post_json(CHAT_PATH, &request)
            .context("Failed to call Cohere chat API")
            .map_err(|e| ChatError::Generation(format!("{:#}", e)))?;

        let text = response
            .message
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(ChatError::Generation(
                "Cohere response missing text content".to_string(),
            ));
        }

        debug!("Cohere returned {} characters", text.len());
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

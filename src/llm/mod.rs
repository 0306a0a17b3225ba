//! Text-generation provider trait and implementations.

pub mod gemini;
pub mod mock;

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::config::LlmConfig;

/// Speaker of one turn, in the provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// One generation call: history, optional system instruction, sampling limits.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub turns: Vec<ChatTurn>,
    pub system_instruction: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
    #[error("response contained no text")]
    EmptyText,
    #[error("{0}")]
    Provider(String),
}

/// Text-generation endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one generation and return the first candidate's text.
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError>;

    /// Human-readable provider name.
    fn name(&self) -> &'static str;
}

/// Create a [`TextGenerator`] from configuration.
///
/// Supported `provider` values:
/// - `"gemini"`: Google Generative Language API.
/// - `"mock"`: Echoes the last user turn, for offline runs.
pub fn create_text_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(gemini::GeminiClient::new(config)?)),
        "mock" => Ok(Arc::new(mock::ScriptedGenerator::echo())),
        other => bail!("unknown LLM provider: {other:?} (expected \"gemini\" or \"mock\")"),
    }
}

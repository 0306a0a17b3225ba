//! One-shot translation of assistant replies through the text generator.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::{ErrorCatalog, ErrorKind};
use crate::config::LlmConfig;
use crate::llm::{ChatTurn, GenerationRequest, LlmError, TextGenerator};
use crate::utils::preview;

pub const DEFAULT_TARGET: &str = "English";

pub struct Translator {
    llm: Arc<dyn TextGenerator>,
    catalog: ErrorCatalog,
    temperature: f32,
    max_output_tokens: u32,
}

impl Translator {
    pub fn new(llm: Arc<dyn TextGenerator>, catalog: ErrorCatalog) -> Self {
        Self {
            llm,
            catalog,
            temperature: 0.2,
            max_output_tokens: 400,
        }
    }

    pub fn from_config(llm: Arc<dyn TextGenerator>, catalog: ErrorCatalog, config: &LlmConfig) -> Self {
        Self {
            temperature: config.translation_temperature,
            max_output_tokens: config.max_output_tokens,
            ..Self::new(llm, catalog)
        }
    }

    pub fn instruction(text: &str, target: &str) -> String {
        format!(
            "Translate the following Akan Twi text to {target}. \
             Do not add any preamble, just the translation: '{text}'"
        )
    }

    /// Translate `text`, keeping the error for callers that branch on it.
    pub async fn try_translate(&self, text: &str, target: &str) -> Result<String, LlmError> {
        let request = GenerationRequest {
            turns: vec![ChatTurn::user(Self::instruction(text, target))],
            system_instruction: None,
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        };
        let translated = self.llm.generate(request).await?;
        let translated = translated.trim();
        if translated.is_empty() {
            return Err(LlmError::EmptyText);
        }
        debug!(target_language = target, text = %preview(translated, 60), "translated");
        Ok(translated.to_string())
    }

    /// Translate `text`, or return the localized failure sentence.
    ///
    /// The failure sentence is indistinguishable from a translation to the
    /// caller; use [`Translator::try_translate`] when that matters.
    pub async fn translate(&self, text: &str, target: &str) -> String {
        match self.try_translate(text, target).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(error = %e, provider = self.llm.name(), "translation failed");
                self.catalog.message(ErrorKind::TranslationFailed).to_string()
            }
        }
    }
}

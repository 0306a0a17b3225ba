//! Turn controller.
//!
//! Drives one [`ChatSession`] through `Idle -> AwaitingResponse -> Idle`.
//! A turn appends the user message, asks the text generator for a reply,
//! appends it, then synthesises and attaches audio. Remote failures never
//! escape a turn: each is logged, mapped to an [`ErrorKind`] and surfaced as
//! a localized [`Notice`].

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::agent::persona::Persona;
use crate::agent::translate::Translator;
use crate::catalog::{ErrorCatalog, ErrorKind, Notice};
use crate::config::{Config, LlmConfig};
use crate::llm::{ChatTurn, GenerationRequest, TextGenerator, create_text_generator};
use crate::session::{ChatSession, Conversation, Message, Role, TranslationView, TurnState};
use crate::speech::SpeechServices;
use crate::utils::preview;

/// Rejected operations. Remote failures are not errors here; they end the
/// turn normally with a notice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("input is empty")]
    EmptyInput,
    #[error("a reply is still pending for the previous message")]
    AwaitingResponse,
    #[error("no user message is waiting for a reply")]
    NotAwaiting,
    #[error("message {0} does not exist")]
    NoSuchMessage(usize),
    #[error("message {0} cannot be translated")]
    NotTranslatable(usize),
}

/// What one turn changed and what the user should be told.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_index: Option<usize>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_output_tokens: 400,
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Map the transcript onto the generator's two roles.
pub fn history(conversation: &Conversation) -> Vec<ChatTurn> {
    conversation
        .messages()
        .iter()
        .map(|m| match m.role {
            Role::User => ChatTurn::user(m.content.clone()),
            Role::Assistant => ChatTurn::model(m.content.clone()),
        })
        .collect()
}

pub struct TurnController {
    llm: Arc<dyn TextGenerator>,
    speech: Arc<SpeechServices>,
    translator: Translator,
    catalog: ErrorCatalog,
    persona: Persona,
    settings: GenerationSettings,
    translation_target: String,
}

impl TurnController {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        speech: Arc<SpeechServices>,
        catalog: ErrorCatalog,
        persona: Persona,
    ) -> Self {
        Self {
            translator: Translator::new(llm.clone(), catalog),
            llm,
            speech,
            catalog,
            persona,
            settings: GenerationSettings::default(),
            translation_target: crate::agent::translate::DEFAULT_TARGET.to_string(),
        }
    }

    /// Wire up providers, persona and settings from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm = create_text_generator(&config.llm)?;
        let speech = Arc::new(SpeechServices::from_config(&config.speech)?);
        let catalog = ErrorCatalog::new(config.chat.locale);
        let persona = Persona::from_config(&config.chat)?;
        info!(
            llm = llm.name(),
            stt = %config.speech.stt.provider,
            tts = %config.speech.tts.provider,
            locale = ?catalog.locale(),
            "Turn controller ready"
        );
        Ok(Self {
            translator: Translator::from_config(llm.clone(), catalog, &config.llm),
            settings: GenerationSettings::from_config(&config.llm),
            translation_target: config.chat.translation_target.clone(),
            ..Self::new(llm, speech, catalog, persona)
        })
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn catalog(&self) -> ErrorCatalog {
        self.catalog
    }

    pub fn speech(&self) -> &SpeechServices {
        &self.speech
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn translation_target(&self) -> &str {
        &self.translation_target
    }

    /// A fresh session opened with the persona's greeting.
    pub fn new_session(&self) -> ChatSession {
        ChatSession::new(self.persona.greeting())
    }

    pub fn greeting(&self) -> Option<&str> {
        self.persona.greeting()
    }

    /// `Idle -> AwaitingResponse`: append the user's message.
    pub fn accept_text(&self, session: &mut ChatSession, text: &str) -> Result<usize, TurnError> {
        if text.trim().is_empty() {
            return Err(TurnError::EmptyInput);
        }
        if session.state() == TurnState::AwaitingResponse {
            return Err(TurnError::AwaitingResponse);
        }
        let index = session.conversation_mut().push(Message::user(text));
        debug!(session = %session.id(), index, text = %preview(text, 80), "user message");
        Ok(index)
    }

    /// `AwaitingResponse -> Idle`: generate a reply, then voice it.
    pub async fn respond(&self, session: &mut ChatSession) -> Result<TurnOutcome, TurnError> {
        if session.state() != TurnState::AwaitingResponse {
            return Err(TurnError::NotAwaiting);
        }

        let request = GenerationRequest {
            turns: history(session.conversation()),
            system_instruction: Some(self.persona.system_instruction().to_string()),
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
        };

        let mut outcome = TurnOutcome::default();
        let reply = match self.llm.generate(request).await {
            Ok(text) => text,
            Err(e) => {
                error!(session = %session.id(), provider = self.llm.name(), error = %e, "generation failed");
                let kind = ErrorKind::GenerationFailed;
                let index = session
                    .conversation_mut()
                    .push(Message::failed(kind, self.catalog.message(kind)));
                outcome.reply_index = Some(index);
                outcome.notices.push(self.catalog.notice(kind));
                return Ok(outcome);
            }
        };

        let index = session.conversation_mut().push(Message::assistant(reply.clone()));
        outcome.reply_index = Some(index);
        info!(session = %session.id(), index, reply = %preview(&reply, 80), "assistant reply");

        match self.voice(&reply).await {
            Ok(path) => {
                debug!(session = %session.id(), index, path = %path.display(), "audio attached");
                session.conversation_mut().attach_audio(index, path);
            }
            Err(kind) => outcome.notices.push(self.catalog.notice(kind)),
        }
        Ok(outcome)
    }

    /// Append typed text and run the reply.
    pub async fn submit_text(
        &self,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let user_index = self.accept_text(session, text)?;
        let mut outcome = self.respond(session).await?;
        outcome.user_index = Some(user_index);
        Ok(outcome)
    }

    /// Transcribe recorded audio and treat the transcript as typed text.
    ///
    /// A failed or blank transcription appends nothing.
    pub async fn submit_voice(
        &self,
        session: &mut ChatSession,
        audio: &[u8],
    ) -> Result<TurnOutcome, TurnError> {
        if audio.is_empty() {
            return Err(TurnError::EmptyInput);
        }
        if session.state() == TurnState::AwaitingResponse {
            return Err(TurnError::AwaitingResponse);
        }

        let transcript = match self.transcribe(audio).await {
            Ok(text) => text,
            Err(kind) => {
                return Ok(TurnOutcome {
                    notices: vec![self.catalog.notice(kind)],
                    ..TurnOutcome::default()
                });
            }
        };

        if transcript.trim().is_empty() {
            info!(session = %session.id(), "empty transcription, nothing to send");
            return Ok(TurnOutcome::default());
        }
        self.submit_text(session, &transcript).await
    }

    /// Flip the translation of an assistant reply, translating on first reveal.
    pub async fn toggle_translation(
        &self,
        session: &mut ChatSession,
        index: usize,
    ) -> Result<TranslationView, TurnError> {
        let message = session
            .conversation()
            .get(index)
            .ok_or(TurnError::NoSuchMessage(index))?;
        if !message.is_reply() {
            return Err(TurnError::NotTranslatable(index));
        }
        let content = message.content.clone();

        let visible = session.translations_mut().toggle(index);
        if !visible {
            return Ok(TranslationView {
                index,
                visible,
                text: None,
            });
        }

        let text = match session.translations().cached(index) {
            Some(cached) => cached.to_string(),
            None => {
                let translated = self
                    .translator
                    .translate(&content, &self.translation_target)
                    .await;
                session.translations_mut().store(index, translated).to_string()
            }
        };
        Ok(TranslationView {
            index,
            visible,
            text: Some(text),
        })
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String, ErrorKind> {
        let stt = self.speech.stt.get().await?;

        let file = write_temp_audio(audio).map_err(|e| {
            error!(error = %e, "could not stage recorded audio");
            ErrorKind::TranscriptionFailed
        })?;
        let result = stt.transcribe(file.path()).await;
        if let Err(e) = file.close() {
            warn!(error = %e, "could not remove recorded audio");
        }

        let text = result.map_err(|e| {
            error!(provider = stt.name(), error = %e, "transcription failed");
            ErrorKind::TranscriptionFailed
        })?;
        debug!(text = %preview(&text, 80), "transcribed");
        Ok(text)
    }

    async fn voice(&self, text: &str) -> Result<std::path::PathBuf, ErrorKind> {
        let tts = self.speech.tts.get().await?;
        let path = tts.synthesize(text).await.map_err(|e| {
            let kind = e.kind();
            match kind.severity() {
                crate::catalog::Severity::Warning => {
                    warn!(provider = tts.name(), error = %e, "synthesis returned no usable path")
                }
                crate::catalog::Severity::Error => {
                    error!(provider = tts.name(), error = %e, "audio generation failed")
                }
            }
            kind
        })?;

        if !readable_file(&path).await {
            warn!(path = %path.display(), "synthesised audio is not a readable file");
            return Err(ErrorKind::AudioPathNotFound);
        }
        Ok(path)
    }
}

fn write_temp_audio(audio: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("evrimabot-")
        .suffix(".webm")
        .tempfile()?;
    file.write_all(audio)?;
    file.flush()?;
    Ok(file)
}

async fn readable_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => tokio::fs::File::open(path).await.is_ok(),
        _ => false,
    }
}

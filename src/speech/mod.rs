//! Speech-to-text / text-to-speech adapter traits and implementations.
//!
//! Both hosted speech services are Gradio apps. Their handles are acquired
//! lazily, once per process, through [`LazyHandle`]s owned by
//! [`SpeechServices`].

pub mod gradio;
pub mod handle;
pub mod mock;
pub mod stt;
pub mod tts;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::info;

use crate::catalog::{ErrorKind, Service};
use crate::config::SpeechConfig;

pub use handle::LazyHandle;

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("could not resolve space {space}: {reason}")]
    Resolve { space: String, reason: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("prediction {api_name} failed: {message}")]
    Prediction { api_name: String, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a synthesis call produced no usable file path.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("synthesis output has no usable path: {0}")]
    InvalidShape(String),
    #[error("synthesised file is not served by the app: {0}")]
    MissingFile(String),
    #[error(transparent)]
    Speech(#[from] SpeechError),
}

impl SynthesisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SynthesisError::InvalidShape(_) => ErrorKind::AudioPathInvalidShape,
            SynthesisError::MissingFile(_) => ErrorKind::AudioPathNotFound,
            SynthesisError::Speech(_) => ErrorKind::AudioGenerationFailed,
        }
    }
}

/// Speech-to-text endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a recorded audio file.
    async fn transcribe(&self, audio: &Path) -> Result<String, SpeechError>;

    /// Human-readable provider name.
    fn name(&self) -> &'static str;
}

/// Text-to-speech endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` and return the location of the produced audio file.
    async fn synthesize(&self, text: &str) -> Result<PathBuf, SynthesisError>;

    /// Human-readable provider name.
    fn name(&self) -> &'static str;
}

/// Process-scoped speech adapters.
pub struct SpeechServices {
    pub stt: LazyHandle<dyn Transcriber>,
    pub tts: LazyHandle<dyn Synthesizer>,
}

impl SpeechServices {
    pub fn new(stt: LazyHandle<dyn Transcriber>, tts: LazyHandle<dyn Synthesizer>) -> Self {
        Self { stt, tts }
    }

    /// Build lazy handles for the providers named in configuration.
    ///
    /// Supported `provider` values for both services:
    /// - `"gradio"`: hosted Gradio app (Space id or base URL).
    /// - `"mock"`: in-process stand-in for offline runs.
    pub fn from_config(config: &SpeechConfig) -> Result<Self> {
        let options = gradio::GradioOptions {
            hub_endpoint: config.hub_endpoint.clone(),
            hf_token: config.hf_token.clone(),
            timeout: config.timeout()?,
        };
        let audio_dir = config.audio_dir();

        let stt = match config.stt.provider.as_str() {
            "gradio" => {
                let stt_config = config.stt.clone();
                let options = options.clone();
                LazyHandle::new(Service::SpeechToText, move || {
                    let stt_config = stt_config.clone();
                    let options = options.clone();
                    async move {
                        let client = gradio::GradioClient::connect(&stt_config.space, &options).await?;
                        let handle: Arc<dyn Transcriber> =
                            Arc::new(stt::GradioTranscriber::new(client, &stt_config));
                        Ok::<_, SpeechError>(handle)
                    }
                })
            }
            "mock" => LazyHandle::ready(
                Service::SpeechToText,
                Arc::new(mock::ScriptedTranscriber::constant("Maakye")) as Arc<dyn Transcriber>,
            ),
            other => bail!("unknown STT provider: {other:?} (expected \"gradio\" or \"mock\")"),
        };

        let tts = match config.tts.provider.as_str() {
            "gradio" => {
                let tts_config = config.tts.clone();
                LazyHandle::new(Service::TextToSpeech, move || {
                    let tts_config = tts_config.clone();
                    let options = options.clone();
                    let audio_dir = audio_dir.clone();
                    async move {
                        let client = gradio::GradioClient::connect(&tts_config.space, &options).await?;
                        let handle: Arc<dyn Synthesizer> =
                            Arc::new(tts::GradioSynthesizer::new(client, &tts_config, audio_dir));
                        Ok::<_, SpeechError>(handle)
                    }
                })
            }
            "mock" => LazyHandle::ready(
                Service::TextToSpeech,
                Arc::new(mock::ScriptedSynthesizer::writing_to(audio_dir)) as Arc<dyn Synthesizer>,
            ),
            other => bail!("unknown TTS provider: {other:?} (expected \"gradio\" or \"mock\")"),
        };

        Ok(Self::new(stt, tts))
    }

    /// Acquire both handles up front so connection problems show up at start-up.
    pub async fn warm_up(&self) -> Vec<ErrorKind> {
        let mut failures = Vec::new();
        if let Err(kind) = self.stt.get().await {
            failures.push(kind);
        }
        if let Err(kind) = self.tts.get().await {
            failures.push(kind);
        }
        if failures.is_empty() {
            info!("Speech services ready");
        }
        failures
    }
}

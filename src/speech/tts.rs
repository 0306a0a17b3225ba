//! Text-to-speech over a hosted Gradio app.
//!
//! The app's output comes in several shapes: a plain path string, an object
//! with a `name` field (older Gradio), or a `FileData` object with `path`
//! and `url`. Paths refer to the app's storage, never to this machine, so
//! every shape is downloaded into the local audio directory.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::TtsConfig;
use crate::speech::gradio::GradioClient;
use crate::speech::{SpeechError, SynthesisError, Synthesizer};

/// Where the synthesised audio lives, as reported by the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AudioOutput {
    /// A downloadable URL.
    Remote(String),
    /// A path in the app's own storage, served under `/file=`.
    Server(String),
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

/// Classify one output value; `None` means the shape is not understood.
pub(crate) fn classify_output(value: &Value) -> Option<AudioOutput> {
    match value {
        Value::String(s) if s.starts_with("http://") || s.starts_with("https://") => {
            Some(AudioOutput::Remote(s.clone()))
        }
        Value::String(s) if !s.trim().is_empty() => Some(AudioOutput::Server(s.clone())),
        Value::Object(_) => {
            if let Some(url) = non_empty_str(value, "url") {
                Some(AudioOutput::Remote(url.to_string()))
            } else {
                non_empty_str(value, "path")
                    .or_else(|| non_empty_str(value, "name"))
                    .map(|p| AudioOutput::Server(p.to_string()))
            }
        }
        _ => None,
    }
}

pub struct GradioSynthesizer {
    client: GradioClient,
    language: String,
    speaker: String,
    api_name: String,
    audio_dir: PathBuf,
}

impl GradioSynthesizer {
    pub fn new(client: GradioClient, config: &TtsConfig, audio_dir: PathBuf) -> Self {
        Self {
            client,
            language: config.language.clone(),
            speaker: config.speaker.clone(),
            api_name: config.api_name.clone(),
            audio_dir,
        }
    }
}

#[async_trait]
impl Synthesizer for GradioSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<PathBuf, SynthesisError> {
        let outputs = self
            .client
            .predict(
                &self.api_name,
                vec![json!(text), json!(self.language), json!(self.speaker)],
            )
            .await?;
        let first = outputs.into_iter().next().unwrap_or(Value::Null);

        let url = match classify_output(&first) {
            Some(AudioOutput::Remote(url)) => url,
            Some(AudioOutput::Server(server_path)) => self.client.file_url(&server_path),
            None => return Err(SynthesisError::InvalidShape(first.to_string())),
        };
        let path = self
            .client
            .download(&url, &self.audio_dir)
            .await
            .map_err(|e| match e {
                SpeechError::Status { status: 404, .. } => SynthesisError::MissingFile(url.clone()),
                other => other.into(),
            })?;

        debug!(path = %path.display(), "synthesis complete");
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "gradio"
    }
}

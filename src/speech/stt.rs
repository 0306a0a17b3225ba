//! Speech-to-text over a hosted Gradio app.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::SttConfig;
use crate::speech::gradio::GradioClient;
use crate::speech::{SpeechError, Transcriber};

pub struct GradioTranscriber {
    client: GradioClient,
    language: String,
    api_name: String,
}

impl GradioTranscriber {
    pub fn new(client: GradioClient, config: &SttConfig) -> Self {
        Self {
            client,
            language: config.language.clone(),
            api_name: config.api_name.clone(),
        }
    }
}

/// Turn the app's first output into text. Non-string outputs are kept as
/// their JSON text; an empty output becomes an empty transcript.
pub(crate) fn output_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Transcriber for GradioTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, SpeechError> {
        let file = self.client.upload(audio).await?;
        let outputs = self
            .client
            .predict(&self.api_name, vec![file, json!(self.language)])
            .await?;
        let first = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SpeechError::Decode("transcription returned no outputs".to_string()))?;

        let text = output_to_text(first);
        debug!(chars = text.chars().count(), "transcription complete");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "gradio"
    }
}

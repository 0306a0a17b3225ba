//! Scripted speech adapters.
//!
//! `ScriptedTranscriber` replays transcripts and remembers whether the input
//! file existed at call time. `ScriptedSynthesizer` writes a short silent WAV
//! per call, or returns a scripted outcome. Both back the `"mock"` provider.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::speech::{SpeechError, SynthesisError, Synthesizer, Transcriber};

/// One observed transcription call.
#[derive(Debug, Clone)]
pub struct TranscriptionCall {
    pub path: PathBuf,
    pub existed: bool,
    pub bytes: usize,
}

#[derive(Debug, Default)]
pub struct ScriptedTranscriber {
    fallback: String,
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<TranscriptionCall>>,
}

impl ScriptedTranscriber {
    /// Always returns `text` once the script is exhausted.
    pub fn constant(text: &str) -> Self {
        Self {
            fallback: text.to_string(),
            ..Default::default()
        }
    }

    pub fn reply(self, text: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(text.to_string()));
        }
        self
    }

    pub fn fail(self, reason: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(reason.to_string()));
        }
        self
    }

    pub fn calls(&self) -> Vec<TranscriptionCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, SpeechError> {
        let bytes = tokio::fs::read(audio).await.map(|b| b.len()).ok();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(TranscriptionCall {
                path: audio.to_path_buf(),
                existed: bytes.is_some(),
                bytes: bytes.unwrap_or(0),
            });
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(SpeechError::Prediction {
                api_name: "/mock".to_string(),
                message: reason,
            }),
            None => Ok(self.fallback.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Scripted result of one synthesis call.
#[derive(Debug, Clone)]
pub enum SynthesisStep {
    /// Write a silent WAV into the output directory.
    Write,
    /// Return this path as-is, whether or not it exists.
    Path(PathBuf),
    /// Report an output shape that carries no path.
    InvalidShape,
    /// Report a failed call.
    Fail(String),
}

#[derive(Debug)]
pub struct ScriptedSynthesizer {
    out_dir: PathBuf,
    script: Mutex<VecDeque<SynthesisStep>>,
    calls: AtomicUsize,
}

impl ScriptedSynthesizer {
    /// Writes a silent WAV into `out_dir` for every call.
    pub fn writing_to(out_dir: PathBuf) -> Self {
        Self {
            out_dir,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, step: SynthesisStep) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<PathBuf, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or(SynthesisStep::Write);

        match step {
            SynthesisStep::Write => {
                tokio::fs::create_dir_all(&self.out_dir)
                    .await
                    .map_err(SpeechError::from)?;
                let path = self.out_dir.join(format!("{}.wav", Uuid::new_v4()));
                tokio::fs::write(&path, silent_wav(16_000, 1_600))
                    .await
                    .map_err(SpeechError::from)?;
                Ok(path)
            }
            SynthesisStep::Path(path) => Ok(path),
            SynthesisStep::InvalidShape => Err(SynthesisError::InvalidShape("{}".to_string())),
            SynthesisStep::Fail(reason) => Err(SynthesisError::Speech(SpeechError::Prediction {
                api_name: "/mock".to_string(),
                message: reason,
            })),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// 16-bit mono PCM WAV of `samples` zero samples.
fn silent_wav(sample_rate: u32, samples: u32) -> Vec<u8> {
    let data_len = samples * 2;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

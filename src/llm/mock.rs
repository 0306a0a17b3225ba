//! Scripted text generator.
//!
//! Replays queued replies (or failures) in order and records every request.
//! With an empty script it echoes the last user turn, which makes it usable
//! as an offline provider as well as in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ChatRole, GenerationRequest, LlmError, TextGenerator};

#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    /// Generator that echoes the last user turn.
    pub fn echo() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(text.to_string()));
        self
    }

    /// Queue a failed call.
    pub fn fail(self, reason: &str) -> Self {
        self.push(Err(reason.to_string()));
        self
    }

    fn push(&self, entry: Result<String, String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        let echo = request
            .turns
            .iter()
            .rev()
            .find(|t| t.role == ChatRole::User)
            .map(|t| format!("(mock) {}", t.text))
            .unwrap_or_else(|| "(mock)".to_string());

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(LlmError::Provider(reason)),
            None => Ok(echo),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

//! Google Generative Language (`generateContent`) client.
//!
//! Request body:
//! `{contents: [{role, parts: [{text}]}], system_instruction: {parts: [{text}]},
//!   generationConfig: {temperature, maxOutputTokens}}`
//!
//! The reply text is `candidates[0].content.parts[0].text`. Any missing step
//! of that path is an error, never a panic.

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::{GenerationRequest, LlmError, TextGenerator};

pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentBody<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout()?)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn body(request: &GenerationRequest) -> GenerateContentBody<'_> {
        GenerateContentBody {
            contents: request
                .turns
                .iter()
                .map(|turn| Content {
                    role: turn.role.as_str(),
                    parts: [Part { text: &turn.text }],
                })
                .collect(),
            system_instruction: request.system_instruction.as_deref().map(|text| {
                SystemInstruction {
                    parts: [Part { text }],
                }
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }
}

/// Pull the first candidate's first text part out of a response payload.
pub(crate) fn extract_text(payload: &Value) -> Result<String, LlmError> {
    let candidate = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or(LlmError::MissingField("candidates[0]"))?;
    let part = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .and_then(|p| p.first())
        .ok_or(LlmError::MissingField("content.parts[0]"))?;
    let text = part
        .get("text")
        .and_then(Value::as_str)
        .ok_or(LlmError::MissingField("parts[0].text"))?
        .trim();

    if text.is_empty() {
        return Err(LlmError::EmptyText);
    }
    Ok(text.to_string())
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        debug!(
            model = %self.model,
            turns = request.turns.len(),
            temperature = request.temperature,
            "sending generateContent request"
        );

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        extract_text(&payload)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use crate::llm::ChatTurn;
    use crate::test_support::spawn_stub;

    fn request() -> GenerationRequest {
        GenerationRequest {
            turns: vec![ChatTurn::model("Afehyia pa!"), ChatTurn::user("Hello")],
            system_instruction: Some("Be kind.".to_string()),
            temperature: 0.4,
            max_output_tokens: 400,
        }
    }

    fn client_for(endpoint: String) -> GeminiClient {
        GeminiClient::new(&LlmConfig {
            endpoint,
            api_key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn body_maps_roles_and_config() {
        let req = request();
        let body = serde_json::to_value(GeminiClient::body(&req)).unwrap();
        assert_eq!(body["contents"][0]["role"], "model");
        assert_eq!(body["contents"][1]["role"], "user");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "Hello");
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "Be kind.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 400);
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn body_omits_missing_system_instruction() {
        let mut req = request();
        req.system_instruction = None;
        let body = serde_json::to_value(GeminiClient::body(&req)).unwrap();
        assert!(body.get("system_instruction").is_none());
    }

    #[test]
    fn extract_text_happy_path() {
        let payload = json!({
            "candidates": [{"content": {"parts": [{"text": "  Akwaaba!\n"}], "role": "model"}}]
        });
        assert_eq!(extract_text(&payload).unwrap(), "Akwaaba!");
    }

    #[test]
    fn extract_text_missing_fields() {
        assert!(matches!(
            extract_text(&json!({})),
            Err(LlmError::MissingField("candidates[0]"))
        ));
        assert!(matches!(
            extract_text(&json!({"candidates": []})),
            Err(LlmError::MissingField("candidates[0]"))
        ));
        assert!(matches!(
            extract_text(&json!({"candidates": [{"finishReason": "SAFETY"}]})),
            Err(LlmError::MissingField("content.parts[0]"))
        ));
        assert!(matches!(
            extract_text(&json!({"candidates": [{"content": {"parts": [{}]}}]})),
            Err(LlmError::MissingField("parts[0].text"))
        ));
    }

    #[test]
    fn extract_text_blank_is_error() {
        let payload = json!({"candidates": [{"content": {"parts": [{"text": "   "}]}}]});
        assert!(matches!(extract_text(&payload), Err(LlmError::EmptyText)));
    }

    #[tokio::test]
    async fn generate_against_stub_endpoint() {
        type Seen = Arc<Mutex<Option<(String, HashMap<String, String>, Value)>>>;
        let seen: Seen = Arc::default();

        let app = Router::new()
            .route(
                "/models/{call}",
                post(
                    |State(seen): State<Seen>,
                     Path(call): Path<String>,
                     Query(query): Query<HashMap<String, String>>,
                     Json(body): Json<Value>| async move {
                        *seen.lock().unwrap() = Some((call, query, body));
                        Json(json!({
                            "candidates": [{"content": {"parts": [{"text": "Akwaaba!"}]}}]
                        }))
                    },
                ),
            )
            .with_state(seen.clone());
        let base = spawn_stub(app).await;

        let reply = client_for(base).generate(request()).await.unwrap();
        assert_eq!(reply, "Akwaaba!");

        let (call, query, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(call, "gemini-2.0-flash:generateContent");
        assert_eq!(query.get("key").map(String::as_str), Some("test-key"));
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn generate_reports_http_status() {
        let app = Router::new().route(
            "/models/{call}",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
        );
        let base = spawn_stub(app).await;

        let err = client_for(base).generate(request()).await.unwrap_err();
        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_reports_transport_failure() {
        // Nothing listens on port 9 of localhost.
        let err = client_for("http://127.0.0.1:9".to_string())
            .generate(request())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
    }
}

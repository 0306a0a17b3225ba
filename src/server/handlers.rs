//! Route handlers for the session API.
//!
//! Turn-running routes take the session's [`TurnGate`](crate::concurrency::TurnGate)
//! without waiting, so a second submission while a reply is in flight is
//! refused with 409 rather than queued. The turn itself runs on its own task
//! holding the permit: a client that disconnects stops waiting for the
//! response, but the turn still finishes and leaves the session idle.

use std::future::Future;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::agent::TurnOutcome;
use crate::server::AppState;
use crate::server::error::ApiError;
use crate::session::{SessionSnapshot, TranslationView};

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    #[serde(flatten)]
    pub outcome: TurnOutcome,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub sessions: usize,
    pub active_turns: usize,
}

fn busy() -> ApiError {
    ApiError::Conflict("a turn is already running for this session".to_string())
}

/// Run work on its own task and wait for it, so a dropped request cannot
/// cancel it halfway.
async fn run_detached<T, F>(turn: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(turn).await.map_err(|e| {
        error!(error = %e, "turn task failed");
        ApiError::Internal(e.to_string())
    })?
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.len(),
        active_turns: state.sessions.active_turns(),
    })
}

/// POST /api/sessions
pub async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let (_, entry) = state.sessions.create(state.controller.greeting());
    let snapshot = entry.session.lock().await.snapshot();
    (StatusCode::CREATED, Json(snapshot))
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let entry = state.session(&id)?;
    let snapshot = entry.session.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// DELETE /api/sessions/{id}
///
/// Waits for a running turn to finish, then deletes the session's audio.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let entry = state
        .sessions
        .remove(&id)
        .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))?;
    run_detached(async move {
        entry.session.lock().await.discard_audio().await;
        Ok::<_, ApiError>(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/{id}/messages
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let entry = state.session(&id)?;
    let permit = entry.gate.try_begin().ok_or_else(busy)?;
    let controller = state.controller.clone();

    run_detached(async move {
        let _permit = permit;
        let mut session = entry.session.lock().await;
        let outcome = controller.submit_text(&mut session, &request.text).await?;
        Ok::<_, ApiError>(Json(TurnResponse {
            outcome,
            session: session.snapshot(),
        }))
    })
    .await
}

/// POST /api/sessions/{id}/voice
///
/// The body is the recorded audio as-is.
pub async fn post_voice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<TurnResponse>, ApiError> {
    let entry = state.session(&id)?;
    let permit = entry.gate.try_begin().ok_or_else(busy)?;
    let controller = state.controller.clone();

    run_detached(async move {
        let _permit = permit;
        let mut session = entry.session.lock().await;
        let outcome = controller.submit_voice(&mut session, &body).await?;
        Ok::<_, ApiError>(Json(TurnResponse {
            outcome,
            session: session.snapshot(),
        }))
    })
    .await
}

/// POST /api/sessions/{id}/messages/{index}/translation
pub async fn toggle_translation(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<TranslationView>, ApiError> {
    let entry = state.session(&id)?;
    let permit = entry.gate.try_begin().ok_or_else(busy)?;
    let controller = state.controller.clone();

    run_detached(async move {
        let _permit = permit;
        let mut session = entry.session.lock().await;
        let view = controller.toggle_translation(&mut session, index).await?;
        Ok::<_, ApiError>(Json(view))
    })
    .await
}

/// GET /api/sessions/{id}/messages/{index}/audio
pub async fn message_audio(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response, ApiError> {
    let entry = state.session(&id)?;
    let path = entry
        .session
        .lock()
        .await
        .audio_path(index)
        .map(|p| p.to_path_buf())
        .ok_or_else(|| ApiError::NotFound(format!("message {index} has no audio")))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "audio file unreadable");
        ApiError::NotFound(format!("audio for message {index} is no longer available"))
    })?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::agent::{Persona, TurnController};
    use crate::catalog::{ErrorCatalog, Locale, Service};
    use crate::llm::mock::ScriptedGenerator;
    use crate::llm::{GenerationRequest, LlmError, TextGenerator};
    use crate::server::{AppState, create_router};
    use crate::session::TurnState;
    use crate::speech::mock::{ScriptedSynthesizer, ScriptedTranscriber};
    use crate::speech::{LazyHandle, SpeechServices, Synthesizer, Transcriber};

    use super::*;

    /// Echoes after a delay, long enough to abandon the request mid-turn.
    struct SlowGenerator {
        delay: Duration,
        inner: ScriptedGenerator,
    }

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
            tokio::time::sleep(self.delay).await;
            self.inner.generate(request).await
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    struct Harness {
        state: AppState,
        _audio: tempfile::TempDir,
    }

    fn harness(llm: Arc<dyn TextGenerator>, stt: Arc<dyn Transcriber>) -> Harness {
        let audio = tempfile::tempdir().unwrap();
        let tts: Arc<dyn Synthesizer> =
            Arc::new(ScriptedSynthesizer::writing_to(audio.path().to_path_buf()));
        let speech = Arc::new(SpeechServices::new(
            LazyHandle::ready(Service::SpeechToText, stt),
            LazyHandle::ready(Service::TextToSpeech, tts),
        ));
        let controller = TurnController::new(
            llm,
            speech,
            ErrorCatalog::new(Locale::Twi),
            Persona::default(),
        );
        Harness {
            state: AppState::new(Arc::new(controller)),
            _audio: audio,
        }
    }

    fn echo_harness() -> Harness {
        harness(
            Arc::new(ScriptedGenerator::echo()),
            Arc::new(ScriptedTranscriber::constant("Maakye")),
        )
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, body)
    }

    async fn send_json(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(state, request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).unwrap()
    }

    async fn new_session(state: &AppState) -> String {
        let (status, body) = send_json(state, post_empty("/api/sessions")).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_sessions() {
        let h = echo_harness();
        new_session(&h.state).await;
        let (status, body) =
            send_json(&h.state, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 1);
        assert_eq!(body["active_turns"], 0);
    }

    #[tokio::test]
    async fn new_session_starts_with_greeting() {
        let h = echo_harness();
        let (status, body) = send_json(&h.state, post_empty("/api/sessions")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["state"], "idle");
        assert_eq!(body["messages"][0]["role"], "assistant");
        assert_eq!(
            body["messages"][0]["content"],
            crate::agent::persona::DEFAULT_GREETING
        );
    }

    #[tokio::test]
    async fn text_turn_round_trip() {
        let h = harness(
            Arc::new(ScriptedGenerator::echo().reply("Akwaaba!")),
            Arc::new(ScriptedTranscriber::constant("")),
        );
        let id = new_session(&h.state).await;

        let (status, body) = send_json(
            &h.state,
            post_json(&format!("/api/sessions/{id}/messages"), json!({"text": "Hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_index"], 1);
        assert_eq!(body["reply_index"], 2);
        assert_eq!(body["notices"], json!([]));
        assert_eq!(body["session"]["messages"][2]["content"], "Akwaaba!");
        assert_eq!(body["session"]["messages"][2]["has_audio"], true);

        let (status, audio) = send(
            &h.state,
            Request::get(format!("/api/sessions/{id}/messages/2/audio"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&audio[0..4], b"RIFF");
    }

    #[tokio::test]
    async fn blank_text_is_bad_request() {
        let h = echo_harness();
        let id = new_session(&h.state).await;
        let (status, body) = send_json(
            &h.state,
            post_json(&format!("/api/sessions/{id}/messages"), json!({"text": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn busy_session_is_conflict() {
        let h = echo_harness();
        let id = new_session(&h.state).await;
        let entry = h.state.sessions.get(&id.parse().unwrap()).unwrap();
        let _held = entry.gate.try_begin().unwrap();

        let (status, body) = send_json(
            &h.state,
            post_json(&format!("/api/sessions/{id}/messages"), json!({"text": "Hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn abandoned_request_still_finishes_turn() {
        let h = harness(
            Arc::new(SlowGenerator {
                delay: Duration::from_millis(200),
                inner: ScriptedGenerator::echo(),
            }),
            Arc::new(ScriptedTranscriber::constant("")),
        );
        let id = new_session(&h.state).await;
        let uri = format!("/api/sessions/{id}/messages");

        let abandoned = tokio::time::timeout(
            Duration::from_millis(30),
            send(&h.state, post_json(&uri, json!({"text": "Hello"}))),
        )
        .await;
        assert!(abandoned.is_err());

        let entry = h.state.sessions.get(&id.parse().unwrap()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while entry.gate.is_busy() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        {
            let session = entry.session.lock().await;
            assert_eq!(session.state(), TurnState::Idle);
            assert_eq!(session.conversation().len(), 3);
        }

        let (status, body) =
            send_json(&h.state, post_json(&uri, json!({"text": "Medaase"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_index"], 3);
        assert_eq!(body["session"]["messages"][4]["content"], "(mock) Medaase");
    }

    #[tokio::test]
    async fn deleting_session_removes_its_audio() {
        let h = echo_harness();
        let id = new_session(&h.state).await;
        let (status, _) = send_json(
            &h.state,
            post_json(&format!("/api/sessions/{id}/messages"), json!({"text": "Hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let entry = h.state.sessions.get(&id.parse().unwrap()).unwrap();
        let audio = entry.session.lock().await.audio_path(2).unwrap().to_path_buf();
        assert!(audio.exists());

        let delete = Request::delete(format!("/api/sessions/{id}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&h.state, delete).await.0, StatusCode::NO_CONTENT);
        assert!(!audio.exists());
    }

    #[tokio::test]
    async fn voice_turn_uses_transcript() {
        let h = echo_harness();
        let id = new_session(&h.state).await;
        let request = Request::post(format!("/api/sessions/{id}/voice"))
            .header(header::CONTENT_TYPE, "audio/webm")
            .body(Body::from(vec![0x1a, 0x45, 0xdf, 0xa3]))
            .unwrap();

        let (status, body) = send_json(&h.state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["messages"][1]["content"], "Maakye");
        assert_eq!(body["session"]["messages"][2]["content"], "(mock) Maakye");
    }

    #[tokio::test]
    async fn translation_toggle_and_errors() {
        let h = harness(
            Arc::new(ScriptedGenerator::echo().reply("Happy new year!")),
            Arc::new(ScriptedTranscriber::constant("")),
        );
        let id = new_session(&h.state).await;
        let uri = format!("/api/sessions/{id}/messages/0/translation");

        let (status, body) = send_json(&h.state, post_empty(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"index": 0, "visible": true, "text": "Happy new year!"}));

        let (_, body) = send_json(&h.state, post_empty(&uri)).await;
        assert_eq!(body, json!({"index": 0, "visible": false}));

        let (status, _) = send_json(
            &h.state,
            post_empty(&format!("/api/sessions/{id}/messages/5/translation")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_and_deleted_sessions_are_not_found() {
        let h = echo_harness();
        let missing = Uuid::new_v4();
        let (status, _) = send_json(
            &h.state,
            Request::get(format!("/api/sessions/{missing}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let id = new_session(&h.state).await;
        let delete = || {
            Request::delete(format!("/api/sessions/{id}"))
                .body(Body::empty())
                .unwrap()
        };
        assert_eq!(send(&h.state, delete()).await.0, StatusCode::NO_CONTENT);
        assert_eq!(send(&h.state, delete()).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn message_without_audio_is_not_found() {
        let h = echo_harness();
        let id = new_session(&h.state).await;
        let (status, body) = send_json(
            &h.state,
            Request::get(format!("/api/sessions/{id}/messages/0/audio"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }
}

//! HTTP control surface.
//!
//! Exposes session lifecycle, text and voice turns, translation toggles and
//! audio playback as a small JSON API for a presentation layer.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::TurnController;
use crate::config::ServerConfig;
use crate::session::{SessionEntry, SessionStore};
use error::ApiError;

/// Largest accepted voice recording.
const MAX_VOICE_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<TurnController>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(controller: Arc<TurnController>) -> Self {
        Self {
            controller,
            sessions: SessionStore::new(),
        }
    }

    fn session(&self, id: &Uuid) -> Result<Arc<SessionEntry>, ApiError> {
        self.sessions
            .get(id)
            .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))
    }
}

fn is_local_origin(origin: &HeaderValue) -> bool {
    origin.to_str().is_ok_and(|o| {
        ["http://localhost", "http://127.0.0.1"]
            .iter()
            .any(|host| o == *host || o.starts_with(&format!("{host}:")))
    })
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin, _| is_local_origin(origin)))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let api = Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/messages", post(handlers::post_message))
        .route(
            "/sessions/{id}/voice",
            post(handlers::post_voice).layer(DefaultBodyLimit::max(MAX_VOICE_BYTES)),
        )
        .route(
            "/sessions/{id}/messages/{index}/translation",
            post(handlers::toggle_translation),
        )
        .route(
            "/sessions/{id}/messages/{index}/audio",
            get(handlers::message_audio),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, controller: Arc<TurnController>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.bind, config.port))?;

    let warm = controller.clone();
    tokio::spawn(async move {
        for kind in warm.speech().warm_up().await {
            warn!(code = kind.code(), "{}", warm.catalog().message(kind));
        }
    });

    let app = create_router(AppState::new(controller));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_origins_only() {
        let ok = |s: &'static str| is_local_origin(&HeaderValue::from_static(s));
        assert!(ok("http://localhost"));
        assert!(ok("http://localhost:5173"));
        assert!(ok("http://127.0.0.1:8510"));
        assert!(!ok("http://localhost.evil.com"));
        assert!(!ok("https://example.com"));
    }
}

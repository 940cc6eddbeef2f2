//! HTTP surface for the session registry.
//!
//! A small axum service owning a [`SessionRegistry`] plus a periodic sweep
//! task. The client never touches the registry type directly; it goes
//! through these routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use super::{SessionRegistry, Validation};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub registry: SessionRegistry,
}

pub type SharedState = Arc<AppState>;

/// Configuration for the registry service.
pub struct ServerConfig {
    pub host: SocketAddr,
    pub ttl: chrono::Duration,
    pub sweep_period: Duration,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: ([127, 0, 0, 1], 4170).into(),
            ttl: chrono::Duration::hours(24),
            sweep_period: Duration::from_secs(30 * 60),
            dev_mode: false,
        }
    }
}

// ── Request/response payload types ────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: i64,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_handle: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateSessionRequest {
    pub session_handle: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateSessionResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/validate", post(validate_session))
        .route("/api/sessions/{handle}", delete(remove_session))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn create_session(
    State(state): State<SharedState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() {
        return Err(ApiError::BadRequest("email is required".to_string()));
    }
    let handle = state.registry.create_session(req.user_id, &req.email).await;
    debug!(user_id = req.user_id, "session created");
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_handle: handle,
        }),
    ))
}

async fn validate_session(
    State(state): State<SharedState>,
    Json(req): Json<ValidateSessionRequest>,
) -> Json<ValidateSessionResponse> {
    let response = match state.registry.validate_session(&req.session_handle).await {
        Validation::Valid {
            owner_id,
            owner_email,
        } => ValidateSessionResponse {
            valid: true,
            owner_id: Some(owner_id),
            owner_email: Some(owner_email),
            reason: None,
        },
        Validation::Invalid { reason } => ValidateSessionResponse {
            valid: false,
            owner_id: None,
            owner_email: None,
            reason: Some(reason.to_string()),
        },
    };
    Json(response)
}

async fn remove_session(
    State(state): State<SharedState>,
    Path(handle): Path<String>,
) -> StatusCode {
    state.registry.remove_session(&handle).await;
    StatusCode::NO_CONTENT
}

async fn health_check() -> &'static str {
    "ok"
}

// ── Server lifecycle ──────────────────────────────────────────────────

/// Spawn the periodic expiry sweep.
///
/// The first tick fires immediately so a restarted service clears stale
/// sessions right away.
pub fn spawn_sweep(state: SharedState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let removed = state.registry.sweep_expired(Utc::now()).await;
            let live = state.registry.len().await;
            info!(removed, live, "session sweep pass");
        }
    })
}

/// Start the registry service and block until shutdown.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let state = Arc::new(AppState {
        registry: SessionRegistry::with_ttl(config.ttl),
    });

    let mut app = api_router().with_state(state.clone());
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let sweep = spawn_sweep(state, config.sweep_period);

    let listener = tokio::net::TcpListener::bind(config.host)
        .await
        .with_context(|| format!("Failed to bind to {}", config.host))?;
    info!(addr = %listener.local_addr()?, "session registry listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweep.abort();
    info!("session registry shut down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = Arc::new(AppState {
            registry: SessionRegistry::new(),
        });
        api_router().with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_create_then_validate_session() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/sessions",
                serde_json::json!({"user_id": 9, "email": "owner@example.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: CreateSessionResponse = body_json(response.into_body()).await;
        assert!(!created.session_handle.is_empty());

        let response = app
            .oneshot(post_json(
                "/api/sessions/validate",
                serde_json::json!({"session_handle": created.session_handle}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let validated: ValidateSessionResponse = body_json(response.into_body()).await;
        assert!(validated.valid);
        assert_eq!(validated.owner_id, Some(9));
        assert_eq!(validated.owner_email.as_deref(), Some("owner@example.com"));
    }

    #[tokio::test]
    async fn test_validate_unknown_handle() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/api/sessions/validate",
                serde_json::json!({"session_handle": "bogus"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let validated: ValidateSessionResponse = body_json(response.into_body()).await;
        assert!(!validated.valid);
        assert_eq!(validated.reason.as_deref(), Some(super::super::EXPIRED_OR_UNKNOWN));
    }

    #[tokio::test]
    async fn test_remove_session_is_idempotent() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/sessions",
                serde_json::json!({"user_id": 1, "email": "a@b.c"}),
            ))
            .await
            .unwrap();
        let created: CreateSessionResponse = body_json(response.into_body()).await;

        for _ in 0..2 {
            let request = Request::builder()
                .method("DELETE")
                .uri(format!("/api/sessions/{}", created.session_handle))
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        let response = app
            .oneshot(post_json(
                "/api/sessions/validate",
                serde_json::json!({"session_handle": created.session_handle}),
            ))
            .await
            .unwrap();
        let validated: ValidateSessionResponse = body_json(response.into_body()).await;
        assert!(!validated.valid);
    }

    #[tokio::test]
    async fn test_create_session_requires_email() {
        let app = test_app();

        let response = app
            .oneshot(post_json(
                "/api/sessions",
                serde_json::json!({"user_id": 1, "email": "  "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["error"], "email is required");
    }
}

//! The game-backend boundary.
//!
//! Everything the workflow needs from the network sits behind [`GameBackend`]:
//! operator verification, session acquisition/validation against the registry,
//! and the per-stage `perform` contract (request → `{success, data}` or
//! `{failure, reason}`). The state machine neither knows nor cares whether a
//! call is live HTTP or simulated.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::{BackendError, StageFault};
use crate::registry::server::{CreateSessionResponse, ValidateSessionResponse};
use crate::user::{CardType, User, UserType};
use crate::workflow::state::OperationParams;

/// Header carrying the game-backend API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Credentials the operator supplies at login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Owner data echoed back by session validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOwner {
    pub owner_id: i64,
    pub owner_email: String,
}

#[async_trait]
pub trait GameBackend: Send + Sync {
    /// Ask the external verification subsystem who this operator is.
    async fn verify_operator(&self, credentials: &Credentials) -> Result<User, BackendError>;

    /// Obtain a session handle for the source account from the registry.
    async fn acquire_session(&self, user_id: i64, email: &str) -> Result<String, BackendError>;

    /// Check a stored handle with the registry; `None` means expired or unknown.
    async fn validate_session(&self, handle: &str)
    -> Result<Option<SessionOwner>, BackendError>;

    /// Drop a session on the registry. Absent handles are not an error.
    async fn release_session(&self, handle: &str) -> Result<(), BackendError>;

    /// Execute one pipeline stage. The failure message is surfaced to the
    /// operator verbatim.
    async fn perform(
        &self,
        stage: &str,
        params: &OperationParams,
    ) -> Result<serde_json::Value, StageFault>;
}

// ── Live HTTP implementation ──────────────────────────────────────────

/// Response envelope of the game backend.
#[derive(Debug, Deserialize)]
struct GameResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    reason: Option<String>,
}

pub struct HttpBackend {
    http: reqwest::Client,
    api_key: String,
    game_api_base: String,
    ranking_url: String,
    registry_url: String,
}

impl HttpBackend {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            game_api_base: config.game_api_base.trim_end_matches('/').to_string(),
            ranking_url: config.ranking_url.clone(),
            registry_url: config.registry_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T, BackendError> {
        let response = self
            .http
            .post(endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::BadResponse {
                endpoint: endpoint.to_string(),
                message: format!("status {status}"),
            });
        }

        response
            .json()
            .await
            .map_err(|source| BackendError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    /// Game responses either carry `data` or a `reason`; unwrap accordingly.
    fn unwrap_game(
        endpoint: &str,
        response: GameResponse,
    ) -> Result<serde_json::Value, BackendError> {
        if response.success {
            Ok(response.data)
        } else {
            Err(BackendError::BadResponse {
                endpoint: endpoint.to_string(),
                message: response
                    .reason
                    .unwrap_or_else(|| "backend reported failure without a reason".to_string()),
            })
        }
    }
}

#[async_trait]
impl GameBackend for HttpBackend {
    async fn verify_operator(&self, credentials: &Credentials) -> Result<User, BackendError> {
        let endpoint = format!("{}/operators/verify", self.game_api_base);
        let body = serde_json::json!({
            "username": credentials.username,
            "email": credentials.email,
            "password": credentials.password,
        });
        let response: GameResponse = self.post_json(&endpoint, &body).await?;
        let data = Self::unwrap_game(&endpoint, response)?;
        serde_json::from_value(data).map_err(|err| BackendError::BadResponse {
            endpoint,
            message: format!("malformed operator record: {err}"),
        })
    }

    async fn acquire_session(&self, user_id: i64, email: &str) -> Result<String, BackendError> {
        let endpoint = format!("{}/api/sessions", self.registry_url);
        let body = serde_json::json!({ "user_id": user_id, "email": email });
        let response: CreateSessionResponse = self.post_json(&endpoint, &body).await?;
        Ok(response.session_handle)
    }

    async fn validate_session(
        &self,
        handle: &str,
    ) -> Result<Option<SessionOwner>, BackendError> {
        let endpoint = format!("{}/api/sessions/validate", self.registry_url);
        let body = serde_json::json!({ "session_handle": handle });
        let response: ValidateSessionResponse = self.post_json(&endpoint, &body).await?;
        match (response.valid, response.owner_id, response.owner_email) {
            (true, Some(owner_id), Some(owner_email)) => Ok(Some(SessionOwner {
                owner_id,
                owner_email,
            })),
            _ => Ok(None),
        }
    }

    async fn release_session(&self, handle: &str) -> Result<(), BackendError> {
        let endpoint = format!("{}/api/sessions/{handle}", self.registry_url);
        let response = self
            .http
            .delete(&endpoint)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(BackendError::BadResponse {
                endpoint,
                message: format!("status {}", response.status()),
            });
        }
        Ok(())
    }

    async fn perform(
        &self,
        stage: &str,
        params: &OperationParams,
    ) -> Result<serde_json::Value, StageFault> {
        // Dependent-records stages go through the ranking service; everything
        // else is an account call on the game API.
        let endpoint = match stage {
            "update-dependent-records" | "sync-dependent-records" => self.ranking_url.clone(),
            _ => format!("{}/account/{stage}", self.game_api_base),
        };
        let body = serde_json::json!({
            "stage": stage,
            "custom_local_id": params.custom_local_id,
            "target_email": params.target_email,
            "target_password": params.target_password,
        });
        // Any transport fault becomes a stage failure with the message passed
        // through; the workflow treats them all the same way.
        let response: GameResponse = self
            .post_json(&endpoint, &body)
            .await
            .map_err(|err| StageFault::new(err.to_string()))?;
        if response.success {
            Ok(response.data)
        } else {
            Err(StageFault::new(response.reason.unwrap_or_else(|| {
                "backend reported failure without a reason".to_string()
            })))
        }
    }
}

// ── Simulated implementation ──────────────────────────────────────────

/// Stand-in backend for `--simulate` runs: every call succeeds after a short
/// pause, and the operator comes back verified on a full card.
pub struct SimulatedBackend {
    latency: Duration,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(150),
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameBackend for SimulatedBackend {
    async fn verify_operator(&self, credentials: &Credentials) -> Result<User, BackendError> {
        self.pause().await;
        Ok(User {
            id: 1,
            username: credentials.username.clone(),
            verified: true,
            card_type: CardType::Full,
            user_type: UserType::Normal,
        })
    }

    async fn acquire_session(&self, _user_id: i64, _email: &str) -> Result<String, BackendError> {
        self.pause().await;
        Ok(uuid::Uuid::new_v4().simple().to_string())
    }

    async fn validate_session(
        &self,
        handle: &str,
    ) -> Result<Option<SessionOwner>, BackendError> {
        self.pause().await;
        if handle.is_empty() {
            return Ok(None);
        }
        Ok(Some(SessionOwner {
            owner_id: 1,
            owner_email: "operator@simulated.localid".to_string(),
        }))
    }

    async fn release_session(&self, _handle: &str) -> Result<(), BackendError> {
        self.pause().await;
        Ok(())
    }

    async fn perform(
        &self,
        stage: &str,
        _params: &OperationParams,
    ) -> Result<serde_json::Value, StageFault> {
        self.pause().await;
        Ok(serde_json::json!({ "stage": stage, "simulated": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_response_parses_success_shape() {
        let response: GameResponse =
            serde_json::from_str(r#"{"success": true, "data": {"id": 3}}"#).unwrap();
        assert!(response.success);
        assert_eq!(response.data["id"], 3);
    }

    #[test]
    fn game_response_parses_failure_shape() {
        let response: GameResponse =
            serde_json::from_str(r#"{"failure": true, "reason": "account locked"}"#).unwrap();
        assert!(!response.success);
        assert_eq!(response.reason.as_deref(), Some("account locked"));
    }

    #[tokio::test]
    async fn simulated_backend_round_trips_a_session() {
        let backend = SimulatedBackend::with_latency(Duration::ZERO);
        let handle = backend.acquire_session(1, "a@b.c").await.unwrap();
        let owner = backend.validate_session(&handle).await.unwrap();
        assert!(owner.is_some());
        backend.release_session(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn simulated_operator_is_verified_full_card() {
        let backend = SimulatedBackend::with_latency(Duration::ZERO);
        let creds = Credentials {
            username: "op".to_string(),
            email: "op@example.com".to_string(),
            password: "secret".to_string(),
        };
        let user = backend.verify_operator(&creds).await.unwrap();
        assert!(user.verified);
        assert_eq!(user.card_type, CardType::Full);
    }
}

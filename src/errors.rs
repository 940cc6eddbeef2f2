//! Typed error hierarchy for the localid client and registry.
//!
//! Two top-level types cover the two failure domains:
//! - `WorkflowError` — operator-visible failures of the operation workflow engine
//! - `BackendError` — transport and contract failures at the game-backend boundary

use thiserror::Error;

/// Errors surfaced by the operation workflow engine.
///
/// Each variant is exactly one operator-visible failure kind. The engine never
/// retries any of them; retry policy, if any, belongs behind the backend seam.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The operator's card tier or verification status does not allow the action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Required input is missing or malformed. Pre-start state is left untouched.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A pipeline is already in flight on this workflow instance.
    #[error("An operation is already in progress")]
    Busy,

    /// Login or session acquisition failed.
    #[error("Login failed: {0}")]
    Auth(String),

    /// A pipeline stage failed; the run is over and progress is frozen where it was.
    #[error("Stage '{stage}' failed: {message}")]
    StageFailure { stage: String, message: String },
}

/// A stage-level failure reported by the game backend.
///
/// The message is surfaced to the operator verbatim, whether it came from a
/// declared `{failure, reason}` response or an unexpected transport fault.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StageFault {
    pub message: String,
}

impl StageFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Transport and contract failures from the registry or game-backend boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from {endpoint}: {message}")]
    BadResponse { endpoint: String, message: String },
}

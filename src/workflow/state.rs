//! Workflow state: phases, run state, logs and operator input.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::user::OperationKind;

/// Where the workflow state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Unauthenticated,
    LoggedIn,
    OperationSelected(OperationKind),
    Running(OperationKind),
    Terminal(RunOutcome),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure,
}

/// One line of the run log, in append order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

/// Operator-supplied inputs for a run.
///
/// `target_email`/`target_password` are only meaningful for clone-to-new.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationParams {
    pub custom_local_id: String,
    pub target_email: Option<String>,
    pub target_password: Option<String>,
}

impl OperationParams {
    pub fn modify_id(custom_local_id: impl Into<String>) -> Self {
        Self {
            custom_local_id: custom_local_id.into(),
            ..Default::default()
        }
    }

    pub fn clone_to_new(
        custom_local_id: impl Into<String>,
        target_email: impl Into<String>,
        target_password: impl Into<String>,
    ) -> Self {
        Self {
            custom_local_id: custom_local_id.into(),
            target_email: Some(target_email.into()),
            target_password: Some(target_password.into()),
        }
    }
}

/// Mutable per-run state, reset to initial values after every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationState {
    /// Target percentage of the last stage that completed, 0–100.
    pub progress_percent: u8,
    /// Set when the pipeline enters `Running`.
    pub started_at: Option<DateTime<Utc>>,
    /// Set once the run reaches a terminal state; freezes the elapsed readout.
    pub finished_at: Option<DateTime<Utc>>,
    pub is_processing: bool,
    pub log: Vec<LogEntry>,
}

impl OperationState {
    /// Elapsed run time: live while processing, frozen once finished.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let started = self.started_at?;
        Some(self.finished_at.unwrap_or(now) - started)
    }
}

/// Read-only view of the engine, safe to render from an observer role.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub phase: WorkflowPhase,
    /// The Local ID currently displayed for the source account; updated on
    /// modify-id success.
    pub current_local_id: Option<String>,
    pub state: OperationState,
}

impl WorkflowSnapshot {
    /// Elapsed-time readout with the terminal label the operator sees.
    pub fn elapsed_display(&self, now: DateTime<Utc>) -> Option<String> {
        let elapsed = self.state.elapsed(now)?;
        let secs = elapsed.num_milliseconds() as f64 / 1000.0;
        Some(match self.phase {
            WorkflowPhase::Terminal(RunOutcome::Success) => format!("{secs:.1}s (completed)"),
            WorkflowPhase::Terminal(RunOutcome::Failure) => format!("{secs:.1}s (interrupted)"),
            _ => format!("{secs:.1}s"),
        })
    }
}

//! The operation workflow engine.
//!
//! A client-resident state machine that gates which operation an operator may
//! run, sequences the stage pipeline with progress and elapsed-time
//! reporting, and guarantees at most one run in flight per instance.
//!
//! The engine owns all mutation of [`OperationState`]; UI layers observe
//! through [`WorkflowObserver`] and never reach in. Starting a run is a
//! two-phase commit: [`OperationWorkflow::request_start`] validates input and
//! hands back a confirmation token, and only
//! [`OperationWorkflow::confirm_start`] with that token crosses the point of
//! no return.

pub mod pipeline;
pub mod state;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::backend::{Credentials, GameBackend};
use crate::errors::WorkflowError;
use crate::user::{OperationKind, User};
use pipeline::stages_for;
use state::{LogEntry, OperationParams, OperationState, RunOutcome, WorkflowPhase, WorkflowSnapshot};

/// Delay between a successful run and the automatic reset, long enough for
/// the operator to review the success log.
pub const AUTO_RESET_DELAY: Duration = Duration::from_secs(3);

/// Receives workflow events. Implementations must not block and must not call
/// back into the workflow; they may be invoked while internal locks are held.
pub trait WorkflowObserver: Send + Sync {
    fn phase_changed(&self, _phase: WorkflowPhase) {}
    fn log_appended(&self, _entry: &LogEntry) {}
    fn progress_changed(&self, _percent: u8) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl WorkflowObserver for NullObserver {}

/// Token returned by [`OperationWorkflow::request_start`]; the run begins
/// only once the same token comes back through `confirm_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmToken(Uuid);

struct Inner {
    phase: WorkflowPhase,
    session_handle: Option<String>,
    current_local_id: Option<String>,
    state: OperationState,
    /// Validated params awaiting confirmation, keyed by token.
    pending: Option<(Uuid, OperationParams)>,
    /// Params of the active/most recent run; cleared on clone success and reset.
    last_params: Option<OperationParams>,
}

pub struct OperationWorkflow {
    backend: Arc<dyn GameBackend>,
    observer: Arc<dyn WorkflowObserver>,
    user: User,
    auto_reset_delay: Option<Duration>,
    /// The busy guard. Claimed synchronously in `confirm_start` before the
    /// first suspension point, so "check idle" and "mark busy" cannot race.
    processing: AtomicBool,
    inner: Mutex<Inner>,
}

impl OperationWorkflow {
    pub fn new(user: User, backend: Arc<dyn GameBackend>) -> Self {
        Self {
            backend,
            observer: Arc::new(NullObserver),
            user,
            auto_reset_delay: Some(AUTO_RESET_DELAY),
            processing: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                phase: WorkflowPhase::Unauthenticated,
                session_handle: None,
                current_local_id: None,
                state: OperationState::default(),
                pending: None,
                last_params: None,
            }),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Override the post-success reset delay; `None` disables the automatic
    /// reset entirely so callers can inspect the terminal state.
    pub fn with_auto_reset(mut self, delay: Option<Duration>) -> Self {
        self.auto_reset_delay = delay;
        self
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn session_handle(&self) -> Option<String> {
        self.lock().session_handle.clone()
    }

    /// Read-only view of the engine for rendering.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        let inner = self.lock();
        WorkflowSnapshot {
            phase: inner.phase,
            current_local_id: inner.current_local_id.clone(),
            state: inner.state.clone(),
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// `Unauthenticated → LoggedIn`: requires a verified operator, then
    /// acquires a session handle through the backend.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), WorkflowError> {
        {
            let inner = self.lock();
            if inner.phase != WorkflowPhase::Unauthenticated {
                return Err(WorkflowError::Validation("already logged in".to_string()));
            }
        }
        if !self.user.verified {
            let mut inner = self.lock();
            self.push_log(&mut inner, "login rejected: operator is not verified");
            return Err(WorkflowError::PermissionDenied(
                "operator is not verified".to_string(),
            ));
        }

        match self
            .backend
            .acquire_session(self.user.id, &credentials.email)
            .await
        {
            Ok(handle) => {
                let mut inner = self.lock();
                inner.session_handle = Some(handle);
                self.push_log(&mut inner, format!("logged in as {}", self.user.username));
                self.set_phase(&mut inner, WorkflowPhase::LoggedIn);
                Ok(())
            }
            Err(err) => {
                let mut inner = self.lock();
                self.push_log(&mut inner, format!("session acquisition failed: {err}"));
                self.set_phase(&mut inner, WorkflowPhase::Unauthenticated);
                Err(WorkflowError::Auth(err.to_string()))
            }
        }
    }

    /// Re-enter `LoggedIn` from a handle mirrored to local storage, after the
    /// registry confirms it is still live.
    pub async fn resume(&self, handle: &str) -> Result<(), WorkflowError> {
        {
            let inner = self.lock();
            if inner.phase != WorkflowPhase::Unauthenticated {
                return Err(WorkflowError::Validation("already logged in".to_string()));
            }
        }
        match self.backend.validate_session(handle).await {
            Ok(Some(_owner)) => {
                let mut inner = self.lock();
                inner.session_handle = Some(handle.to_string());
                self.push_log(&mut inner, "session resumed");
                self.set_phase(&mut inner, WorkflowPhase::LoggedIn);
                Ok(())
            }
            Ok(None) => Err(WorkflowError::Auth(
                "stored session is expired or unknown".to_string(),
            )),
            Err(err) => Err(WorkflowError::Auth(err.to_string())),
        }
    }

    /// `LoggedIn → OperationSelected`, re-checking the permission gate.
    pub fn select_operation(&self, op: OperationKind) -> Result<(), WorkflowError> {
        let mut inner = self.lock();
        match inner.phase {
            WorkflowPhase::LoggedIn | WorkflowPhase::OperationSelected(_) => {}
            WorkflowPhase::Unauthenticated => {
                return Err(WorkflowError::Auth("not logged in".to_string()));
            }
            WorkflowPhase::Running(_) => return Err(WorkflowError::Busy),
            WorkflowPhase::Terminal(_) => {
                return Err(WorkflowError::Validation(
                    "previous run not cleared; reset first".to_string(),
                ));
            }
        }
        if let Err(err) = self.user.check_permission(op) {
            self.push_log(&mut inner, format!("selection of {op} rejected: {err}"));
            return Err(err);
        }
        self.push_log(&mut inner, format!("operation selected: {op}"));
        self.set_phase(&mut inner, WorkflowPhase::OperationSelected(op));
        Ok(())
    }

    /// First half of the start commit: gate and validate, then hand back the
    /// token the confirmation prompt must return.
    pub fn request_start(&self, params: OperationParams) -> Result<ConfirmToken, WorkflowError> {
        let mut inner = self.lock();
        let op = match inner.phase {
            WorkflowPhase::OperationSelected(op) => op,
            WorkflowPhase::Running(_) => return Err(WorkflowError::Busy),
            _ => {
                return Err(WorkflowError::Validation(
                    "no operation selected".to_string(),
                ));
            }
        };
        if self.processing.load(Ordering::Acquire) {
            return Err(WorkflowError::Busy);
        }
        // Permission first: a denied tier never reaches input validation.
        if let Err(err) = self.user.check_permission(op) {
            self.push_log(&mut inner, format!("start of {op} rejected: {err}"));
            return Err(err);
        }
        if let Err(err) = validate_params(op, &params) {
            self.push_log(&mut inner, format!("start of {op} rejected: {err}"));
            return Err(err);
        }

        let token = Uuid::new_v4();
        inner.pending = Some((token, params));
        self.push_log(&mut inner, format!("awaiting confirmation to start {op}"));
        Ok(ConfirmToken(token))
    }

    /// Operator declined the destructive-action prompt. Not an error: the
    /// workflow stays in `OperationSelected` with one cancellation entry.
    pub fn decline_start(&self, token: &ConfirmToken) -> Result<(), WorkflowError> {
        let mut inner = self.lock();
        match inner.pending.take() {
            Some((pending, _)) if pending == token.0 => {
                self.push_log(&mut inner, "operation cancelled before start");
                Ok(())
            }
            Some(other) => {
                inner.pending = Some(other);
                Err(WorkflowError::Validation(
                    "unknown confirmation token".to_string(),
                ))
            }
            None => Err(WorkflowError::Validation(
                "no start pending confirmation".to_string(),
            )),
        }
    }

    /// Second half of the start commit: claim the busy guard, enter
    /// `Running` and execute the pipeline to a terminal state.
    pub async fn confirm_start(&self, token: &ConfirmToken) -> Result<RunOutcome, WorkflowError> {
        // Claim the run before the first suspension point. The run log is
        // part of the guarded state, so a busy reject surfaces only through
        // the observer and leaves `OperationState` untouched.
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.observer
                .log_appended(&LogEntry::now("start rejected: operation already running"));
            return Err(WorkflowError::Busy);
        }

        let (op, params) = {
            let mut inner = self.lock();
            let params = match inner.pending.take() {
                Some((pending, params)) if pending == token.0 => params,
                other => {
                    inner.pending = other;
                    self.processing.store(false, Ordering::Release);
                    return Err(WorkflowError::Validation(
                        "no start pending confirmation".to_string(),
                    ));
                }
            };
            let op = match inner.phase {
                WorkflowPhase::OperationSelected(op) => op,
                _ => {
                    self.processing.store(false, Ordering::Release);
                    return Err(WorkflowError::Validation(
                        "no operation selected".to_string(),
                    ));
                }
            };
            inner.last_params = Some(params.clone());
            inner.state.is_processing = true;
            inner.state.started_at = Some(Utc::now());
            inner.state.finished_at = None;
            self.push_log(&mut inner, format!("starting {op}"));
            self.set_phase(&mut inner, WorkflowPhase::Running(op));
            (op, params)
        };

        let result = self.execute_pipeline(op, &params).await;
        self.processing.store(false, Ordering::Release);

        if matches!(result, Ok(RunOutcome::Success))
            && let Some(delay) = self.auto_reset_delay
        {
            tokio::time::sleep(delay).await;
            let _ = self.reset();
        }
        result
    }

    /// Run the stage sequence for `op`, advancing progress per stage and
    /// stopping at the first failure with progress frozen where it was.
    async fn execute_pipeline(
        &self,
        op: OperationKind,
        params: &OperationParams,
    ) -> Result<RunOutcome, WorkflowError> {
        for stage in stages_for(op) {
            {
                let inner = self.lock();
                if !matches!(inner.phase, WorkflowPhase::Running(_)) {
                    // The workflow was torn down underneath the run (logout).
                    self.observer
                        .log_appended(&LogEntry::now("run abandoned: workflow was torn down"));
                    return Ok(RunOutcome::Failure);
                }
            }

            match self.backend.perform(stage.name, params).await {
                Ok(_payload) => {
                    let mut inner = self.lock();
                    inner.state.progress_percent = stage.target_percent;
                    self.push_log(
                        &mut inner,
                        format!("{} done ({}%)", stage.name, stage.target_percent),
                    );
                    self.observer.progress_changed(stage.target_percent);
                }
                Err(fault) => {
                    let mut inner = self.lock();
                    // Progress stays at the last successful stage's target.
                    inner.state.is_processing = false;
                    inner.state.finished_at = Some(Utc::now());
                    self.push_log(
                        &mut inner,
                        format!("{} failed: {}", stage.name, fault.message),
                    );
                    self.set_phase(&mut inner, WorkflowPhase::Terminal(RunOutcome::Failure));
                    return Err(WorkflowError::StageFailure {
                        stage: stage.name.to_string(),
                        message: fault.message,
                    });
                }
            }
        }

        let mut inner = self.lock();
        inner.state.is_processing = false;
        inner.state.finished_at = Some(Utc::now());
        match op {
            OperationKind::ModifyId => {
                inner.current_local_id = Some(params.custom_local_id.clone());
                self.push_log(
                    &mut inner,
                    format!("local id is now {}", params.custom_local_id),
                );
            }
            OperationKind::CloneToNew => {
                // Target credentials and the custom Local ID are spent.
                inner.last_params = None;
                self.push_log(&mut inner, "account data cloned to target");
            }
        }
        self.set_phase(&mut inner, WorkflowPhase::Terminal(RunOutcome::Success));
        Ok(RunOutcome::Success)
    }

    /// `Terminal → LoggedIn`: clear the run state, keep the session. Always
    /// reachable once no run is in flight, including after a failure.
    pub fn reset(&self) -> Result<(), WorkflowError> {
        if self.processing.load(Ordering::Acquire) {
            return Err(WorkflowError::Busy);
        }
        let mut inner = self.lock();
        inner.state = OperationState::default();
        inner.pending = None;
        inner.last_params = None;
        let phase = if inner.session_handle.is_some() {
            WorkflowPhase::LoggedIn
        } else {
            WorkflowPhase::Unauthenticated
        };
        self.set_phase(&mut inner, phase);
        Ok(())
    }

    /// Drop the session and all run state, from any state. Idempotent.
    pub async fn logout(&self) {
        let handle = {
            let mut inner = self.lock();
            inner.state = OperationState::default();
            inner.pending = None;
            inner.last_params = None;
            self.set_phase(&mut inner, WorkflowPhase::Unauthenticated);
            inner.session_handle.take()
        };
        if let Some(handle) = handle
            && let Err(err) = self.backend.release_session(&handle).await
        {
            warn!(error = %err, "failed to release session on the registry");
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_phase(&self, inner: &mut Inner, phase: WorkflowPhase) {
        inner.phase = phase;
        self.observer.phase_changed(phase);
    }

    fn push_log(&self, inner: &mut Inner, message: impl Into<String>) {
        let entry = LogEntry::now(message);
        inner.state.log.push(entry.clone());
        self.observer.log_appended(&entry);
    }
}

/// Input checks for the pre-start state. A failure leaves the workflow where
/// it was; only the log records the rejection.
fn validate_params(op: OperationKind, params: &OperationParams) -> Result<(), WorkflowError> {
    if params.custom_local_id.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "a custom Local ID is required".to_string(),
        ));
    }
    if op == OperationKind::CloneToNew {
        let email = params.target_email.as_deref().unwrap_or("").trim();
        if email.is_empty() {
            return Err(WorkflowError::Validation(
                "target email is required".to_string(),
            ));
        }
        if !email.contains('@') || !email.contains('.') {
            return Err(WorkflowError::Validation(
                "target email is malformed".to_string(),
            ));
        }
        if params
            .target_password
            .as_deref()
            .is_none_or(|pw| pw.is_empty())
        {
            return Err(WorkflowError::Validation(
                "target password is required".to_string(),
            ));
        }
    }
    Ok(())
}

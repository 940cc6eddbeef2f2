//! Session registry: issues, validates and expires session handles for the
//! logged-in source account.
//!
//! Handles are opaque and unique over the set of live sessions; they are not
//! credentials toward the game backend itself. The registry is the only owner
//! of session records, and every operation takes the coarse map lock so
//! create/validate/remove/sweep stay atomic with respect to one another.

pub mod server;

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, hash_map::Entry};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Reason string reported for any handle that cannot be validated.
///
/// Deliberately does not distinguish "never existed" from "expired".
pub const EXPIRED_OR_UNKNOWN: &str = "expired-or-unknown";

/// A live session record.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub handle: String,
    pub owner_id: i64,
    pub owner_email: String,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful validation; drives expiry.
    pub last_activity_at: DateTime<Utc>,
}

/// Outcome of a validation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid { owner_id: i64, owner_email: String },
    Invalid { reason: &'static str },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionRegistry {
    /// Registry with the standard 24 hour idle lifetime.
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(24))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Register a session for `owner_id` and return its handle.
    ///
    /// The handle is guaranteed unique among currently live sessions; a
    /// colliding draw is redrawn rather than overwriting an existing record.
    pub async fn create_session(&self, owner_id: i64, owner_email: &str) -> String {
        self.create_session_at(owner_id, owner_email, Utc::now())
            .await
    }

    pub async fn create_session_at(
        &self,
        owner_id: i64,
        owner_email: &str,
        now: DateTime<Utc>,
    ) -> String {
        let mut sessions = self.sessions.write().await;
        let (entry, handle) = loop {
            let handle = Uuid::new_v4().simple().to_string();
            if let Entry::Vacant(entry) = sessions.entry(handle.clone()) {
                break (entry, handle);
            }
        };
        entry.insert(Session {
            handle: handle.clone(),
            owner_id,
            owner_email: owner_email.to_string(),
            created_at: now,
            last_activity_at: now,
        });
        handle
    }

    /// Check a handle, refreshing its activity timestamp when valid.
    ///
    /// A handle that was never issued, was removed, or has sat idle past the
    /// TTL all report the same [`EXPIRED_OR_UNKNOWN`] reason.
    pub async fn validate_session(&self, handle: &str) -> Validation {
        self.validate_session_at(handle, Utc::now()).await
    }

    pub async fn validate_session_at(&self, handle: &str, now: DateTime<Utc>) -> Validation {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(handle) {
            Some(session) if now - session.last_activity_at <= self.ttl => {
                session.last_activity_at = now;
                Validation::Valid {
                    owner_id: session.owner_id,
                    owner_email: session.owner_email.clone(),
                }
            }
            _ => Validation::Invalid {
                reason: EXPIRED_OR_UNKNOWN,
            },
        }
    }

    /// Drop a session. Absent handles are not an error.
    pub async fn remove_session(&self, handle: &str) {
        self.sessions.write().await.remove(handle);
    }

    /// Remove every session idle past the TTL; returns how many were dropped.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_activity_at <= self.ttl);
        before - sessions.len()
    }

    /// Number of currently live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Durable mirror of the client session.
//!
//! The registry keeps the authoritative session in memory; the client
//! mirrors its handle (plus the operator record) to a fixed file so a later
//! invocation can attempt resumption. The mirror is a hint, never proof —
//! resumption always re-validates the handle with the registry.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::user::User;

/// Fixed file name, so reloads always find the same session.
pub const STORE_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session_handle: String,
    pub user: User,
    pub saved_at: DateTime<Utc>,
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store under the user's config directory (`<config>/localid/session.json`).
    pub fn open_default() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("Could not determine a user config directory")?
            .join("localid");
        Ok(Self::at(dir.join(STORE_FILE)))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session store: {}", self.path.display()))?;
        let stored = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session store: {}", self.path.display()))?;
        Ok(Some(stored))
    }

    pub fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session store directory")?;
        }
        let content =
            serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session store: {}", self.path.display()))
    }

    /// Remove the mirror. Absent files are not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("Failed to remove session store: {}", self.path.display())
            }),
        }
    }
}

//! Operator session commands: login, status, logout.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use console::style;
use tracing::warn;

use localid::backend::{Credentials, GameBackend};
use localid::session_store::{SessionStore, StoredSession};
use localid::user::OperationKind;
use localid::workflow::OperationWorkflow;

pub async fn login(
    backend: Arc<dyn GameBackend>,
    username: String,
    email: String,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => dialoguer::Password::new()
            .with_prompt("Operator password")
            .interact()?,
    };
    let credentials = Credentials {
        username,
        email,
        password,
    };

    let user = backend.verify_operator(&credentials).await?;
    let workflow = OperationWorkflow::new(user.clone(), backend);
    workflow.login(&credentials).await?;
    let session_handle = workflow
        .session_handle()
        .context("Login did not produce a session handle")?;

    let store = SessionStore::open_default()?;
    store.save(&StoredSession {
        session_handle,
        user: user.clone(),
        saved_at: Utc::now(),
    })?;

    println!(
        "Logged in as {} ({} card, {})",
        style(&user.username).bold(),
        user.card_type,
        user.user_type
    );
    Ok(())
}

pub async fn status(backend: Arc<dyn GameBackend>) -> Result<()> {
    let store = SessionStore::open_default()?;
    let Some(stored) = store.load()? else {
        println!("Not logged in");
        return Ok(());
    };

    let user = &stored.user;
    println!(
        "Operator: {} ({} card, {}, {})",
        style(&user.username).bold(),
        user.card_type,
        user.user_type,
        if user.verified {
            "verified"
        } else {
            "unverified"
        }
    );

    match backend.validate_session(&stored.session_handle).await? {
        Some(owner) => println!("Session:  valid ({})", owner.owner_email),
        None => println!(
            "Session:  {} — run 'localid login' again",
            style("expired-or-unknown").yellow()
        ),
    }

    for op in [OperationKind::ModifyId, OperationKind::CloneToNew] {
        let verdict = if user.may_run(op) {
            style("allowed").green()
        } else {
            style("denied").red()
        };
        println!("  {op}: {verdict}");
    }
    Ok(())
}

pub async fn logout(backend: Arc<dyn GameBackend>) -> Result<()> {
    let store = SessionStore::open_default()?;
    if let Some(stored) = store.load()? {
        // Best effort: the registry removal is idempotent and the local
        // mirror goes away regardless.
        if let Err(err) = backend.release_session(&stored.session_handle).await {
            warn!(error = %err, "could not release session on the registry");
        }
    }
    store.clear()?;
    println!("Logged out");
    Ok(())
}

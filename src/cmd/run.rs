//! `localid run` — drive one account operation through the pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;

use localid::backend::GameBackend;
use localid::session_store::SessionStore;
use localid::ui::ProgressUi;
use localid::user::OperationKind;
use localid::workflow::OperationWorkflow;
use localid::workflow::state::{OperationParams, RunOutcome};

pub struct RunArgs {
    pub operation: OperationKind,
    pub local_id: String,
    pub target_email: Option<String>,
    pub target_password: Option<String>,
}

pub async fn run_operation(
    backend: Arc<dyn GameBackend>,
    args: RunArgs,
    yes: bool,
    verbose: bool,
) -> Result<()> {
    let store = SessionStore::open_default()?;
    let stored = store
        .load()?
        .context("Not logged in. Run 'localid login' first.")?;

    let ui = Arc::new(ProgressUi::new(verbose));
    let workflow = OperationWorkflow::new(stored.user, backend).with_observer(ui);
    workflow
        .resume(&stored.session_handle)
        .await
        .context("Stored session is no longer valid; run 'localid login' again")?;

    workflow.select_operation(args.operation)?;
    let token = workflow.request_start(OperationParams {
        custom_local_id: args.local_id,
        target_email: args.target_email,
        target_password: args.target_password,
    })?;

    let confirmed = if yes {
        println!("  {} (--yes flag)", style("Auto-approved").dim());
        true
    } else {
        Confirm::new()
            .with_prompt(format!(
                "{} rewrites account data and cannot be undone. Continue?",
                args.operation
            ))
            .default(false)
            .interact()?
    };
    if !confirmed {
        workflow.decline_start(&token)?;
        println!("{}", style("Cancelled — nothing was changed.").yellow());
        return Ok(());
    }

    match workflow.confirm_start(&token).await? {
        RunOutcome::Success => {
            let snapshot = workflow.snapshot();
            println!("{}", style("Operation completed.").green().bold());
            if let Some(local_id) = snapshot.current_local_id {
                println!("Current Local ID: {}", style(local_id).bold());
            }
            Ok(())
        }
        RunOutcome::Failure => anyhow::bail!("run was abandoned before completing"),
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use localid::backend::{GameBackend, HttpBackend, SimulatedBackend};
use localid::config::AppConfig;
use localid::user::OperationKind;

mod cmd;

#[derive(Parser)]
#[command(name = "localid")]
#[command(version, about = "Local ID rename and clone operations for game accounts")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip the destructive-action confirmation prompt
    #[arg(long, global = true)]
    pub yes: bool,

    /// Config file path (defaults to ./localid.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the simulated game backend instead of live HTTP
    #[arg(long, global = true)]
    pub simulate: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Host the session registry service
    Serve {
        /// Override the configured registry port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Verify the operator and store a session handle
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        /// Password for scripted use; prompted when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Run one account operation through the pipeline
    Run {
        /// Which operation to run
        #[arg(value_enum)]
        operation: OperationKind,
        /// The new custom Local ID
        #[arg(long)]
        local_id: String,
        /// Target account email (clone-to-new only)
        #[arg(long)]
        target_email: Option<String>,
        /// Target account password (clone-to-new only)
        #[arg(long)]
        target_password: Option<String>,
    },
    /// Show the stored session and permitted operations
    Status,
    /// Drop the stored session, locally and on the registry
    Logout,
}

/// Initializes tracing collection on stderr, leaving stdout to the command
/// output and progress UI.
fn setup_tracing(verbose: bool) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let default_filter = if verbose { "debug" } else { "info" };
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn build_backend(cli: &Cli, config: &AppConfig) -> Result<Arc<dyn GameBackend>> {
    if cli.simulate {
        Ok(Arc::new(SimulatedBackend::new()))
    } else {
        Ok(Arc::new(HttpBackend::new(config)?))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    // Missing required keys are a fatal startup condition, reported here
    // before any command logic runs.
    let config = AppConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Serve { port } => cmd::serve::serve(&config, *port).await,
        Commands::Login {
            username,
            email,
            password,
        } => {
            let backend = build_backend(&cli, &config)?;
            cmd::session::login(backend, username.clone(), email.clone(), password.clone()).await
        }
        Commands::Run {
            operation,
            local_id,
            target_email,
            target_password,
        } => {
            let backend = build_backend(&cli, &config)?;
            cmd::run::run_operation(
                backend,
                cmd::run::RunArgs {
                    operation: *operation,
                    local_id: local_id.clone(),
                    target_email: target_email.clone(),
                    target_password: target_password.clone(),
                },
                cli.yes,
                cli.verbose,
            )
            .await
        }
        Commands::Status => {
            let backend = build_backend(&cli, &config)?;
            cmd::session::status(backend).await
        }
        Commands::Logout => {
            let backend = build_backend(&cli, &config)?;
            cmd::session::logout(backend).await
        }
    }
}

// ABOUTME: Entry point for the tranche CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tranche::config::{self, Config};
use tranche::error::Result;
use tranche::output::{Output, OutputMode};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    // Ctrl-C cancels an in-flight rollout, which then rolls back
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            token.cancel();
        }
    });

    if let Err(e) = run(cli.command, mode, cancel).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, mode: OutputMode, cancel: CancellationToken) -> Result<()> {
    let cwd = env::current_dir()?;

    match command {
        Commands::Init { deployment, force } => {
            config::init_config(&cwd, deployment.as_deref(), force)?;
            Output::new(mode).success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Rollout {
            version,
            batch_size,
            dry_run,
            force,
        } => {
            let config = Config::discover(&cwd)?;
            commands::rollout(
                config,
                &version,
                batch_size,
                dry_run,
                force,
                cancel,
                Output::new(mode),
            )
            .await
        }
        Commands::Rollback {
            pattern,
            deployment,
            force,
            dry_run,
            version,
        } => {
            let config = Config::discover(&cwd)?;
            let args = commands::RollbackArgs {
                pattern,
                deployment,
                force,
                dry_run,
                version,
            };
            commands::rollback(config, args, Output::new(mode)).await
        }
    }
}

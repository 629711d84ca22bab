// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tranche")]
#[command(about = "Rolling-batch deployments with health checks and automatic rollback")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new tranche.yml configuration file
    Init {
        /// Deployment name to put in the template
        #[arg(short, long)]
        deployment: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Roll a version out to every target, batch by batch
    Rollout {
        /// Version to deploy
        version: String,

        /// Number of targets deployed together
        batch_size: usize,

        /// Print the batch plan without deploying anything
        #[arg(long)]
        dry_run: bool,

        /// Break an existing rollout lock
        #[arg(short, long)]
        force: bool,
    },

    /// Revert matching targets to their last known good version
    Rollback {
        /// Regular expression matched against target ids
        pattern: String,

        /// Deployment to roll back; must match the configured deployment
        deployment: String,

        /// Break an existing rollout lock
        #[arg(short, long)]
        force: bool,

        /// Validate and list the targets without reverting anything
        #[arg(long)]
        dry_run: bool,

        /// Revert to this version instead of each target's inventory version
        #[arg(long)]
        version: Option<String>,
    },
}

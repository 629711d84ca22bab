// ABOUTME: Emergency rollback command implementation.
// ABOUTME: Reverts targets whose id matches a pattern to a known good version.

use regex::Regex;
use tranche::config::Config;
use tranche::deploy::{CommandExecutor, RevertEntry, RollbackManager, RolloutLock};
use tranche::diagnostics::{Diagnostics, Warning};
use tranche::error::{Error, Result};
use tranche::health::{HealthProber, HttpHealthCheck};
use tranche::output::Output;
use tranche::types::Version;

/// Arguments of `tranche rollback`.
pub struct RollbackArgs {
    pub pattern: String,
    pub deployment: String,
    pub force: bool,
    pub dry_run: bool,
    pub version: Option<String>,
}

/// Revert every target matching `args.pattern`.
pub async fn rollback(config: Config, args: RollbackArgs, mut output: Output) -> Result<()> {
    config.ensure_deployment(&args.deployment)?;
    let pattern = Regex::new(&args.pattern)?;
    let override_version = args.version.as_deref().map(Version::new).transpose()?;

    output.start_timer();

    let entries: Vec<RevertEntry> = config
        .inventory()?
        .list_targets()
        .await?
        .into_iter()
        .filter(|t| pattern.is_match(t.id.as_str()))
        .map(|t| {
            let to_version = override_version.clone().unwrap_or_else(|| t.version.clone());
            RevertEntry::new(t, to_version)
        })
        .collect();

    if entries.is_empty() {
        return Err(Error::NoMatchingTargets(args.pattern));
    }

    output.progress(&format!(
        "Rolling back {} target(s) of {}",
        entries.len(),
        config.deployment
    ));
    for entry in &entries {
        output.progress(&format!("  → {} to {}", entry.target.id, entry.to_version));
    }

    if args.dry_run {
        output.success(&format!(
            "Dry run: {} target(s) would be rolled back",
            entries.len()
        ));
        return Ok(());
    }

    output.progress("  → Acquiring rollout lock...");
    let lock = RolloutLock::acquire(&config.state_dir, &config.deployment, args.force).await?;
    let mut diag = Diagnostics::default();

    let executor = CommandExecutor::new(config.deployment.clone(), &config.deploy);
    let prober = HealthProber::new(HttpHealthCheck::new());
    let manager = RollbackManager::new(&executor, &prober);
    let result = manager
        .rollback(&entries, &config.rollback_probe_policy())
        .await;

    // Release the lock whatever the outcome (non-fatal if it fails)
    if let Err(e) = lock.release().await {
        diag.warn(Warning::lock_release(format!(
            "failed to release rollout lock: {e}"
        )));
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    match result {
        Ok(summary) => {
            output.success(&format!(
                "Rolled back {} target(s)",
                summary.reverted.len()
            ));
            Ok(())
        }
        Err(e) => {
            for manual in &e.manual_intervention_required {
                output.warning(&format!("{}: {}", manual.target, manual.reason));
            }
            Err(Error::ManualIntervention(e.inconsistent_targets()))
        }
    }
}

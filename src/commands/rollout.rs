// ABOUTME: Rollout command implementation.
// ABOUTME: Plans batches, takes the rollout lock, and drives the coordinator.

use tokio_util::sync::CancellationToken;
use tranche::config::Config;
use tranche::deploy::{
    AuditLog, CommandExecutor, RolloutCoordinator, RolloutLock, RolloutStatus, plan,
};
use tranche::diagnostics::{Diagnostics, Warning};
use tranche::error::{Error, Result};
use tranche::health::HttpHealthCheck;
use tranche::inventory::StaticInventory;
use tranche::output::Output;
use tranche::types::Version;

/// Roll `version` out to every configured target.
pub async fn rollout(
    config: Config,
    version: &str,
    batch_size: usize,
    dry_run: bool,
    force: bool,
    cancel: CancellationToken,
    mut output: Output,
) -> Result<()> {
    let version = Version::new(version)?;
    output.start_timer();

    // Read the inventory once; the coordinator works from this snapshot.
    let targets = config.inventory()?.list_targets().await?;
    let batches = plan(&targets, batch_size)?;

    if dry_run {
        output.plan(&version, &batches);
        return Ok(());
    }

    output.progress(&format!(
        "Rolling out {} ({}) to {} target(s) in {} batch(es)",
        config.deployment,
        version,
        targets.len(),
        batches.len()
    ));

    output.progress("  → Acquiring rollout lock...");
    let lock = RolloutLock::acquire(&config.state_dir, &config.deployment, force).await?;
    let mut diag = Diagnostics::default();

    let executor = CommandExecutor::new(config.deployment.clone(), &config.deploy);
    let mut coordinator = RolloutCoordinator::new(
        config.deployment.clone(),
        executor,
        HttpHealthCheck::new(),
        config.rollout_settings(),
    )
    .with_cancellation(cancel);
    if let Some(path) = &config.audit_log {
        coordinator = coordinator.with_audit_log(AuditLog::new(path.clone()));
    }

    let result = coordinator
        .run(&StaticInventory::new(targets), &version, batch_size)
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

    let report = result?;
    output.report(&report);

    match report.status {
        RolloutStatus::Succeeded => {
            output.success("Rollout complete!");
            Ok(())
        }
        RolloutStatus::FailedManual => Err(Error::ManualIntervention(report.inconsistent_targets())),
        RolloutStatus::FailedRolledBack | RolloutStatus::InProgress => {
            Err(Error::RolledBack { version })
        }
    }
}

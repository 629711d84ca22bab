// ABOUTME: Rollback manager: reverts targets to a known version and re-validates them.
// ABOUTME: Failures are collected per target and reported for manual intervention.

use futures::future::join_all;
use serde::Serialize;

use super::{DeploymentExecutor, ManualIntervention, RollbackError};
use crate::health::{HealthCheck, HealthProber, ProbePolicy};
use crate::inventory::Target;
use crate::types::{TargetId, Version};

/// One target to put back on `to_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertEntry {
    pub target: Target,
    pub to_version: Version,
}

impl RevertEntry {
    pub fn new(target: Target, to_version: Version) -> Self {
        Self { target, to_version }
    }
}

/// Targets reverted and confirmed healthy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    pub reverted: Vec<TargetId>,
}

/// Reverts a set of targets through an executor and probes each afterwards.
pub struct RollbackManager<'a, E, H> {
    executor: &'a E,
    prober: &'a HealthProber<H>,
}

impl<'a, E, H> RollbackManager<'a, E, H>
where
    E: DeploymentExecutor,
    H: HealthCheck,
{
    pub fn new(executor: &'a E, prober: &'a HealthProber<H>) -> Self {
        Self { executor, prober }
    }

    /// Revert every entry concurrently, then probe it with `policy`.
    ///
    /// A target whose revert call fails, or that is unhealthy afterwards,
    /// ends up in [`RollbackError::manual_intervention_required`]. Nothing is
    /// retried. Running this again on already reverted targets reverts them to
    /// the version they already run, which must not change anything.
    pub async fn rollback(
        &self,
        entries: &[RevertEntry],
        policy: &ProbePolicy,
    ) -> Result<RollbackSummary, RollbackError> {
        if entries.is_empty() {
            return Ok(RollbackSummary::default());
        }

        tracing::warn!(targets = entries.len(), "rolling back");

        let results = join_all(entries.iter().map(|entry| self.revert_one(entry, policy))).await;

        let mut reverted = Vec::new();
        let mut manual = Vec::new();
        for (entry, result) in entries.iter().zip(results) {
            match result {
                Ok(()) => reverted.push(entry.target.id.clone()),
                Err(reason) => {
                    tracing::warn!(target_id = %entry.target.id, %reason, "target needs manual intervention");
                    manual.push(ManualIntervention {
                        target: entry.target.id.clone(),
                        reason,
                    });
                }
            }
        }

        if manual.is_empty() {
            tracing::info!(reverted = reverted.len(), "rollback complete");
            Ok(RollbackSummary { reverted })
        } else {
            Err(RollbackError {
                reverted,
                manual_intervention_required: manual,
            })
        }
    }

    async fn revert_one(&self, entry: &RevertEntry, policy: &ProbePolicy) -> Result<(), String> {
        let target = &entry.target;
        tracing::debug!(target_id = %target.id, to_version = %entry.to_version, "reverting");

        self.executor
            .revert(target, &entry.to_version)
            .await
            .map_err(|e| format!("revert failed: {e}"))?;

        let health = self.prober.probe(target, policy).await;
        if health.passed() {
            Ok(())
        } else {
            Err(format!("after revert, {}", health.describe()))
        }
    }
}

// ABOUTME: Rollout coordinator: drives batches through deploy, probe, commit or rollback.
// ABOUTME: Owns the rollout state; batches run sequentially, members of a batch in parallel.

use chrono::Utc;
use futures::future::join_all;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::audit::{AuditEvent, AuditLog};
use super::planner::plan;
use super::registry::RolloutRegistry;
use super::report::{BatchOutcome, BatchResult, FailureStage, MemberFailure, RolloutReport};
use super::rollback::{RevertEntry, RollbackManager};
use super::state::RolloutState;
use super::{DeploymentExecutor, ManualIntervention, RolloutError};
use crate::diagnostics::{Diagnostics, Warning};
use crate::health::{HealthCheck, HealthProber, ProbePolicy};
use crate::inventory::{InventoryProvider, Target};
use crate::types::{DeploymentName, RolloutId, TargetId, Version};

/// Tunables for one coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutSettings {
    /// Policy for probing freshly deployed targets.
    pub probe: ProbePolicy,
    /// Policy for probing reverted targets.
    pub rollback_probe: ProbePolicy,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
    /// Revert automatically when a batch fails.
    pub auto_rollback: bool,
}

impl RolloutSettings {
    pub fn new(probe: ProbePolicy) -> Self {
        Self {
            probe,
            rollback_probe: probe,
            batch_delay: Duration::ZERO,
            auto_rollback: true,
        }
    }
}

/// What happened to one batch member before the barrier.
#[derive(Debug)]
enum MemberOutcome {
    Healthy,
    DeployFailed(String),
    Unhealthy(String),
    /// `deployed` is true once the deploy call was issued.
    Cancelled { deployed: bool },
}

/// Runs a rollout of one deployment.
pub struct RolloutCoordinator<E, H> {
    deployment: DeploymentName,
    executor: E,
    prober: HealthProber<H>,
    settings: RolloutSettings,
    registry: RolloutRegistry,
    audit: Option<AuditLog>,
    cancel: CancellationToken,
}

impl<E, H> RolloutCoordinator<E, H>
where
    E: DeploymentExecutor,
    H: HealthCheck,
{
    pub fn new(
        deployment: DeploymentName,
        executor: E,
        health_check: H,
        settings: RolloutSettings,
    ) -> Self {
        Self {
            deployment,
            executor,
            prober: HealthProber::new(health_check),
            settings,
            registry: RolloutRegistry::global(),
            audit: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a specific registry instead of the process-wide one.
    pub fn with_registry(mut self, registry: RolloutRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the rollout and triggers rollback when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Roll `version` out to every target in `inventory`, `batch_size` at a time.
    ///
    /// The inventory is read once. Returns `Err` only for problems detected
    /// before the first side effect; every failure after that is reported in
    /// the returned [`RolloutReport`] through its status.
    pub async fn run(
        &self,
        inventory: &dyn InventoryProvider,
        version: &Version,
        batch_size: usize,
    ) -> Result<RolloutReport, RolloutError> {
        let _guard = self.registry.acquire(&self.deployment)?;

        let started_at = Utc::now();
        let rollout_id = RolloutId::new(format!(
            "{}-{}",
            self.deployment,
            started_at.format("%Y%m%dT%H%M%S%3fZ")
        ));

        let targets = inventory.list_targets().await?;
        let batches = plan(&targets, batch_size)?;
        let mut state = RolloutState::new(version.clone(), batch_size, batches);
        let mut diagnostics = Diagnostics::default();
        let mut outcomes = Vec::new();

        tracing::info!(
            deployment = %self.deployment,
            %version,
            batch_size,
            batches = state.batches().len(),
            targets = targets.len(),
            "starting rollout"
        );
        self.audit(
            &rollout_id,
            AuditEvent::RolloutStarted {
                version: state.desired_version().clone(),
                batch_size: state.batch_size(),
                batches: state.batches().len(),
                targets: targets.iter().map(|t| t.id.clone()).collect(),
            },
            &mut diagnostics,
        )
        .await;

        // Members of the failing batch that may be running the new version.
        let mut touched: Option<Vec<TargetId>> = None;
        // Members of the failing batch whose deploy call failed.
        let mut deploy_failed = Vec::new();

        for index in 0..state.batches().len() {
            if !self.wait_before_batch(index).await {
                tracing::warn!(deployment = %self.deployment, batch = index, "rollout cancelled");
                touched = Some(Vec::new());
                break;
            }

            state.begin_batch(index);
            let batch = state.batches()[index].clone();
            tracing::info!(
                deployment = %self.deployment,
                batch = state.current_batch(),
                targets = batch.len(),
                "deploying batch"
            );

            let results = join_all(
                batch
                    .targets()
                    .iter()
                    .map(|target| self.process_member(target, version)),
            )
            .await;

            let mut failures = Vec::new();
            let mut deployed = Vec::new();
            for (target, outcome) in batch.targets().iter().zip(results) {
                let id = target.id.clone();
                match outcome {
                    MemberOutcome::Healthy => deployed.push(id),
                    MemberOutcome::DeployFailed(reason) => {
                        deploy_failed.push(id.clone());
                        failures.push(MemberFailure {
                            target: id,
                            stage: FailureStage::Deploy,
                            reason,
                        });
                    }
                    MemberOutcome::Unhealthy(reason) => {
                        deployed.push(id.clone());
                        failures.push(MemberFailure {
                            target: id,
                            stage: FailureStage::Health,
                            reason,
                        });
                    }
                    MemberOutcome::Cancelled { deployed: issued } => {
                        if issued {
                            deployed.push(id.clone());
                        }
                        failures.push(MemberFailure {
                            target: id,
                            stage: FailureStage::Cancelled,
                            reason: "rollout cancelled".to_string(),
                        });
                    }
                }
            }

            let result = if failures.is_empty() {
                BatchResult::Succeeded
            } else {
                BatchResult::Failed
            };
            self.audit(
                &rollout_id,
                AuditEvent::BatchCompleted {
                    batch: index,
                    result,
                    targets: batch.ids(),
                },
                &mut diagnostics,
            )
            .await;

            if failures.is_empty() {
                tracing::info!(deployment = %self.deployment, batch = index, "batch healthy, committing");
                state.commit_batch(batch.ids());
                outcomes.push(BatchOutcome {
                    index,
                    targets: batch.ids(),
                    result,
                    failures,
                });
                continue;
            }

            for failure in &failures {
                tracing::warn!(
                    deployment = %self.deployment,
                    batch = index,
                    target_id = %failure.target,
                    stage = ?failure.stage,
                    reason = %failure.reason,
                    "batch member failed"
                );
            }
            state.record_failed(failures.iter().map(|f| f.target.clone()));
            outcomes.push(BatchOutcome {
                index,
                targets: batch.ids(),
                result,
                failures,
            });
            touched = Some(deployed);
            break;
        }

        let mut reverted = Vec::new();
        let mut manual_intervention = Vec::new();
        if let Some(batch_members) = touched {
            state.begin_rollback();
            let mut to_revert: Vec<TargetId> = state.committed().to_vec();
            to_revert.extend(batch_members);

            if self.settings.auto_rollback {
                let entries = self.revert_entries(&state, &to_revert);
                let manager = RollbackManager::new(&self.executor, &self.prober);
                match manager.rollback(&entries, &self.settings.rollback_probe).await {
                    Ok(summary) => reverted = summary.reverted,
                    Err(e) => {
                        reverted = e.reverted;
                        manual_intervention = e.manual_intervention_required;
                    }
                }
            } else {
                tracing::warn!(deployment = %self.deployment, "automatic rollback disabled");
                to_revert.extend(deploy_failed);
                manual_intervention = to_revert
                    .into_iter()
                    .map(|target| ManualIntervention {
                        target,
                        reason: "automatic rollback disabled".to_string(),
                    })
                    .collect();
            }

            state.finish_rollback(&reverted, manual_intervention.is_empty());
            self.audit(
                &rollout_id,
                AuditEvent::RollbackCompleted {
                    reverted: reverted.clone(),
                    manual_intervention: manual_intervention
                        .iter()
                        .map(|m| m.target.clone())
                        .collect(),
                },
                &mut diagnostics,
            )
            .await;
        }

        let status = state.status();
        tracing::info!(
            deployment = %self.deployment,
            %status,
            phase = ?state.phase(),
            "rollout finished"
        );
        self.audit(
            &rollout_id,
            AuditEvent::RolloutFinished { status },
            &mut diagnostics,
        )
        .await;

        Ok(RolloutReport {
            rollout_id,
            deployment: self.deployment.clone(),
            version: state.desired_version().clone(),
            batch_size: state.batch_size(),
            status,
            batches: outcomes,
            committed: state.committed().to_vec(),
            failed: state.failed().to_vec(),
            reverted,
            manual_intervention,
            warnings: diagnostics.into_messages(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Returns false if the rollout was cancelled before batch `index` could start.
    async fn wait_before_batch(&self, index: usize) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if index == 0 || self.settings.batch_delay.is_zero() {
            return true;
        }

        tracing::debug!(batch = index, delay = ?self.settings.batch_delay, "pausing before batch");
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.settings.batch_delay) => true,
        }
    }

    async fn process_member(&self, target: &Target, version: &Version) -> MemberOutcome {
        if self.cancel.is_cancelled() {
            return MemberOutcome::Cancelled { deployed: false };
        }

        let deployed = tokio::select! {
            _ = self.cancel.cancelled() => return MemberOutcome::Cancelled { deployed: true },
            result = self.executor.deploy(target, version) => result,
        };
        if let Err(e) = deployed {
            return MemberOutcome::DeployFailed(e.to_string());
        }

        let health = tokio::select! {
            _ = self.cancel.cancelled() => return MemberOutcome::Cancelled { deployed: true },
            health = self.prober.probe(target, &self.settings.probe) => health,
        };
        if health.passed() {
            MemberOutcome::Healthy
        } else {
            MemberOutcome::Unhealthy(health.describe())
        }
    }

    fn revert_entries(&self, state: &RolloutState, ids: &[TargetId]) -> Vec<RevertEntry> {
        ids.iter()
            .filter_map(|id| {
                let target = state.target(id)?;
                let to_version = state.previous_version(id)?;
                Some(RevertEntry::new(target.clone(), to_version.clone()))
            })
            .collect()
    }

    async fn audit(&self, rollout_id: &RolloutId, event: AuditEvent, diagnostics: &mut Diagnostics) {
        let Some(log) = &self.audit else {
            return;
        };
        if let Err(e) = log.record(rollout_id, &self.deployment, &event).await {
            diagnostics.warn(Warning::audit_write(format!(
                "failed to write audit log {}: {}",
                log.path().display(),
                e
            )));
        }
    }
}

// ABOUTME: Final rollout report returned by the coordinator.
// ABOUTME: Serializable so the CLI can print it as JSON and the audit log can reuse its parts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ManualIntervention, RolloutStatus};
use crate::types::{DeploymentName, RolloutId, TargetId, Version};

/// Which step a batch member failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Deploy,
    Health,
    Cancelled,
}

/// One member's failure within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberFailure {
    pub target: TargetId,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchResult {
    Succeeded,
    Failed,
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub index: usize,
    pub targets: Vec<TargetId>,
    pub result: BatchResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<MemberFailure>,
}

/// Everything a caller needs after a rollout reaches a terminal status.
#[derive(Debug, Clone, Serialize)]
pub struct RolloutReport {
    pub rollout_id: RolloutId,
    pub deployment: DeploymentName,
    pub version: Version,
    pub batch_size: usize,
    pub status: RolloutStatus,
    pub batches: Vec<BatchOutcome>,
    pub committed: Vec<TargetId>,
    pub failed: Vec<TargetId>,
    pub reverted: Vec<TargetId>,
    pub manual_intervention: Vec<ManualIntervention>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RolloutReport {
    pub fn succeeded(&self) -> bool {
        self.status == RolloutStatus::Succeeded
    }

    /// Targets an operator has to look at.
    pub fn inconsistent_targets(&self) -> Vec<TargetId> {
        self.manual_intervention
            .iter()
            .map(|m| m.target.clone())
            .collect()
    }

    /// Number of batches that were started.
    pub fn batches_processed(&self) -> usize {
        self.batches.len()
    }
}

// ABOUTME: Error types for rollout planning, execution, rollback, and locking.
// ABOUTME: Planning errors are fatal; deploy errors are recoverable values.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::inventory::InventoryError;
use crate::types::{DeploymentName, TargetId};

/// Category of a failed deploy or revert call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployErrorKind {
    /// The deploy backend could not be invoked at all.
    Spawn,
    /// The backend ran and reported failure.
    Failed,
    /// The backend did not finish within its time budget.
    Timeout,
}

impl fmt::Display for DeployErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployErrorKind::Spawn => "spawn failure",
            DeployErrorKind::Failed => "backend failure",
            DeployErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// A deploy or revert side effect failed for one target.
///
/// Always recoverable at the rollout level: it fails the batch and triggers
/// rollback, it never aborts the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} on {target}: {reason}")]
pub struct DeployError {
    pub target: TargetId,
    pub kind: DeployErrorKind,
    pub reason: String,
}

impl DeployError {
    pub fn new(target: TargetId, kind: DeployErrorKind, reason: impl Into<String>) -> Self {
        Self {
            target,
            kind,
            reason: reason.into(),
        }
    }

    /// Backend reported failure.
    pub fn failed(target: TargetId, reason: impl Into<String>) -> Self {
        Self::new(target, DeployErrorKind::Failed, reason)
    }
}

/// Errors from partitioning targets into batches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("inventory is empty, nothing to roll out")]
    EmptyInventory,

    #[error("invalid batch size {batch_size}: must be between 1 and {targets}")]
    InvalidBatchSize { batch_size: usize, targets: usize },

    #[error("duplicate target in plan: {0}")]
    DuplicateTarget(TargetId),
}

/// Errors that stop a rollout before any side effect is performed.
#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("a rollout of {0} is already in progress")]
    AlreadyInProgress(DeploymentName),
}

/// A target that automation could not bring back to a known-good state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualIntervention {
    pub target: TargetId,
    pub reason: String,
}

/// Rollback finished with at least one target left inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "rollback incomplete, manual intervention required for: {}",
    join_targets(.manual_intervention_required)
)]
pub struct RollbackError {
    /// Targets reverted and confirmed healthy.
    pub reverted: Vec<TargetId>,
    /// Targets whose revert or post-revert probe failed.
    pub manual_intervention_required: Vec<ManualIntervention>,
}

impl RollbackError {
    pub fn inconsistent_targets(&self) -> Vec<TargetId> {
        self.manual_intervention_required
            .iter()
            .map(|m| m.target.clone())
            .collect()
    }
}

fn join_targets(items: &[ManualIntervention]) -> String {
    items
        .iter()
        .map(|m| format!("{} ({})", m.target, m.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from acquiring or releasing the on-disk rollout lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("rollout lock for {deployment} held by {holder} (pid {pid}) since {started_at}")]
    Held {
        deployment: String,
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("lock file {} exists but is unreadable; use --force to break it", .0.display())]
    Unreadable(PathBuf),

    #[error("lock for {0} acquired by another process while breaking it")]
    Contended(String),

    #[error("failed to access lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode lock info: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LockError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        LockError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

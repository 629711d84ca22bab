// ABOUTME: Mutable state of one rollout run, owned by the coordinator.
// ABOUTME: Tracks phase, committed and failed targets, and the pre-rollout version snapshot.

use serde::Serialize;
use std::collections::HashMap;

use super::planner::Batch;
use crate::inventory::Target;
use crate::types::{TargetId, Version};

/// Externally visible status of a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutStatus {
    InProgress,
    Succeeded,
    FailedRolledBack,
    FailedManual,
}

impl RolloutStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RolloutStatus::InProgress)
    }
}

impl std::fmt::Display for RolloutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RolloutStatus::InProgress => "in_progress",
            RolloutStatus::Succeeded => "succeeded",
            RolloutStatus::FailedRolledBack => "failed_rolled_back",
            RolloutStatus::FailedManual => "failed_manual",
        };
        f.write_str(s)
    }
}

/// Coordinator state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    BatchInProgress(usize),
    RollingBack,
    Succeeded,
    FailedRolledBack,
    FailedManual,
}

impl Phase {
    pub fn status(self) -> RolloutStatus {
        match self {
            Phase::Planning | Phase::BatchInProgress(_) | Phase::RollingBack => {
                RolloutStatus::InProgress
            }
            Phase::Succeeded => RolloutStatus::Succeeded,
            Phase::FailedRolledBack => RolloutStatus::FailedRolledBack,
            Phase::FailedManual => RolloutStatus::FailedManual,
        }
    }

    fn can_transition_to(self, next: Phase) -> bool {
        match (self, next) {
            (Phase::Planning, Phase::BatchInProgress(0)) => true,
            (Phase::BatchInProgress(i), Phase::BatchInProgress(j)) => j == i + 1,
            (Phase::BatchInProgress(_), Phase::Succeeded | Phase::RollingBack) => true,
            // Cancellation can arrive during the pause before the first batch starts.
            (Phase::Planning, Phase::RollingBack) => true,
            (Phase::RollingBack, Phase::FailedRolledBack | Phase::FailedManual) => true,
            _ => false,
        }
    }
}

/// The state of one rollout run.
///
/// `committed` and `failed` only change at batch boundaries, after every
/// member of the batch has reported. Once the phase is terminal every
/// mutator is a no-op.
#[derive(Debug)]
pub struct RolloutState {
    desired_version: Version,
    batch_size: usize,
    batches: Vec<Batch>,
    previous_versions: HashMap<TargetId, Version>,
    committed: Vec<TargetId>,
    failed: Vec<TargetId>,
    current_batch: usize,
    phase: Phase,
}

impl RolloutState {
    /// Create the state and snapshot every target's pre-rollout version.
    pub fn new(desired_version: Version, batch_size: usize, batches: Vec<Batch>) -> Self {
        let previous_versions = batches
            .iter()
            .flat_map(|b| b.targets().iter())
            .map(|t| (t.id.clone(), t.version.clone()))
            .collect();

        Self {
            desired_version,
            batch_size,
            batches,
            previous_versions,
            committed: Vec::new(),
            failed: Vec::new(),
            current_batch: 0,
            phase: Phase::Planning,
        }
    }

    pub fn desired_version(&self) -> &Version {
        &self.desired_version
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> RolloutStatus {
        self.phase.status()
    }

    pub fn current_batch(&self) -> usize {
        self.current_batch
    }

    pub fn committed(&self) -> &[TargetId] {
        &self.committed
    }

    pub fn failed(&self) -> &[TargetId] {
        &self.failed
    }

    /// Version the target ran before this rollout touched it.
    pub fn previous_version(&self, id: &TargetId) -> Option<&Version> {
        self.previous_versions.get(id)
    }

    /// Look up a planned target by id.
    pub fn target(&self, id: &TargetId) -> Option<&Target> {
        self.batches
            .iter()
            .flat_map(|b| b.targets().iter())
            .find(|t| &t.id == id)
    }

    fn transition(&mut self, next: Phase) -> bool {
        if self.status().is_terminal() {
            tracing::warn!(phase = ?self.phase, ?next, "ignoring transition out of terminal phase");
            return false;
        }
        if !self.phase.can_transition_to(next) {
            tracing::warn!(phase = ?self.phase, ?next, "ignoring invalid phase transition");
            return false;
        }
        self.phase = next;
        true
    }

    pub(crate) fn begin_batch(&mut self, index: usize) -> bool {
        let ok = self.transition(Phase::BatchInProgress(index));
        if ok {
            self.current_batch = index;
        }
        ok
    }

    /// Record a healthy batch and move on, finishing after the last one.
    pub(crate) fn commit_batch(&mut self, ids: Vec<TargetId>) {
        if self.status().is_terminal() {
            return;
        }
        self.committed.extend(ids);
        if self.current_batch + 1 == self.batches.len() {
            self.transition(Phase::Succeeded);
        }
    }

    pub(crate) fn record_failed(&mut self, ids: impl IntoIterator<Item = TargetId>) {
        if self.status().is_terminal() {
            return;
        }
        for id in ids {
            if !self.failed.contains(&id) {
                self.failed.push(id);
            }
        }
    }

    pub(crate) fn begin_rollback(&mut self) -> bool {
        self.transition(Phase::RollingBack)
    }

    /// Finish a rollback; reverted targets leave the committed set.
    pub(crate) fn finish_rollback(&mut self, reverted: &[TargetId], clean: bool) {
        if self.phase != Phase::RollingBack {
            return;
        }
        self.committed.retain(|id| !reverted.contains(id));
        let next = if clean {
            Phase::FailedRolledBack
        } else {
            Phase::FailedManual
        };
        self.transition(next);
    }
}

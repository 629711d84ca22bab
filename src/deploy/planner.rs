// ABOUTME: Batch planner: partitions the ordered inventory into rollout batches.
// ABOUTME: Pure and deterministic; the plan is immutable once produced.

use nonempty::NonEmpty;
use serde::Serialize;
use std::collections::HashSet;

use super::PlanError;
use crate::inventory::Target;
use crate::types::TargetId;

/// An ordered, non-empty chunk of targets processed behind one barrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    index: usize,
    targets: NonEmpty<Target>,
}

impl Batch {
    /// Zero-based position in the plan.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn targets(&self) -> &NonEmpty<Target> {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// A batch always holds at least one target.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn ids(&self) -> Vec<TargetId> {
        self.targets.iter().map(|t| t.id.clone()).collect()
    }
}

/// Partition `targets` into consecutive batches of `batch_size`.
///
/// The last batch may be smaller. Concatenating the batches yields `targets`
/// in the original order.
///
/// # Errors
///
/// - [`PlanError::EmptyInventory`] if `targets` is empty
/// - [`PlanError::InvalidBatchSize`] unless `1 <= batch_size <= targets.len()`
/// - [`PlanError::DuplicateTarget`] if an id appears twice
pub fn plan(targets: &[Target], batch_size: usize) -> Result<Vec<Batch>, PlanError> {
    if targets.is_empty() {
        return Err(PlanError::EmptyInventory);
    }

    if batch_size == 0 || batch_size > targets.len() {
        return Err(PlanError::InvalidBatchSize {
            batch_size,
            targets: targets.len(),
        });
    }

    let mut seen = HashSet::with_capacity(targets.len());
    for target in targets {
        if !seen.insert(&target.id) {
            return Err(PlanError::DuplicateTarget(target.id.clone()));
        }
    }

    let batches = targets
        .chunks(batch_size)
        .filter_map(NonEmpty::from_slice)
        .enumerate()
        .map(|(index, targets)| Batch { index, targets })
        .collect();

    Ok(batches)
}

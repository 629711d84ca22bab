// ABOUTME: In-process mutual exclusion for rollouts of the same deployment.
// ABOUTME: Guards release their slot on drop, including on panic or cancellation.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use super::RolloutError;
use crate::types::DeploymentName;

static GLOBAL: LazyLock<RolloutRegistry> = LazyLock::new(RolloutRegistry::default);

/// Set of deployments with a rollout in progress.
#[derive(Debug, Clone, Default)]
pub struct RolloutRegistry {
    active: Arc<Mutex<HashSet<DeploymentName>>>,
}

impl RolloutRegistry {
    /// Registry shared by every coordinator in this process.
    pub fn global() -> RolloutRegistry {
        GLOBAL.clone()
    }

    /// Claim `deployment`, failing if another rollout already holds it.
    pub fn acquire(&self, deployment: &DeploymentName) -> Result<RolloutGuard, RolloutError> {
        let mut active = self.active.lock();
        if !active.insert(deployment.clone()) {
            return Err(RolloutError::AlreadyInProgress(deployment.clone()));
        }
        Ok(RolloutGuard {
            registry: self.clone(),
            deployment: deployment.clone(),
        })
    }

    pub fn is_active(&self, deployment: &DeploymentName) -> bool {
        self.active.lock().contains(deployment)
    }
}

/// Proof that a rollout slot is held.
#[derive(Debug)]
pub struct RolloutGuard {
    registry: RolloutRegistry,
    deployment: DeploymentName,
}

impl Drop for RolloutGuard {
    fn drop(&mut self) {
        self.registry.active.lock().remove(&self.deployment);
    }
}

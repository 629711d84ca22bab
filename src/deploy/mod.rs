// ABOUTME: Rollout orchestration: planning, executing, validating and rolling back batches.
// ABOUTME: Exports the coordinator, its collaborators, and the rollout state machine.

mod audit;
mod coordinator;
mod error;
mod executor;
mod lock;
mod planner;
mod registry;
mod report;
mod rollback;
mod state;

pub use audit::{AuditEvent, AuditLog};
pub use coordinator::{RolloutCoordinator, RolloutSettings};
pub use error::{
    DeployError, DeployErrorKind, LockError, ManualIntervention, PlanError, RollbackError,
    RolloutError,
};
pub use executor::{CommandExecutor, DeploymentExecutor};
pub use lock::{LockInfo, RolloutLock};
pub use planner::{Batch, plan};
pub use registry::{RolloutGuard, RolloutRegistry};
pub use report::{BatchOutcome, BatchResult, FailureStage, MemberFailure, RolloutReport};
pub use rollback::{RevertEntry, RollbackManager, RollbackSummary};
pub use state::{Phase, RolloutState, RolloutStatus};

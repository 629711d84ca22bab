// ABOUTME: Application-wide error types for tranche.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::{LockError, PlanError, RolloutError};
use crate::inventory::InventoryError;
use crate::types::{TargetId, Version, VersionError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown deployment: {got} (configured deployment is {expected})")]
    UnknownDeployment { expected: String, got: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid version: {0}")]
    InvalidVersion(#[from] VersionError),

    #[error("invalid target pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("no targets match pattern {0}")]
    NoMatchingTargets(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Rollout(#[from] RolloutError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("rollout of {version} failed and was rolled back")]
    RolledBack { version: Version },

    #[error(
        "manual intervention required, targets left in an inconsistent state: {}",
        join_ids(.0)
    )]
    ManualIntervention(Vec<TargetId>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn join_ids(ids: &[TargetId]) -> String {
    ids.iter()
        .map(TargetId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;

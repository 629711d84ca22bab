// ABOUTME: Inventory error types with SNAFU pattern.
// ABOUTME: Carries the file and line that made an inventory unusable.

use snafu::Snafu;
use std::path::PathBuf;

use crate::health::ProbeError;
use crate::types::{TargetId, TargetIdError, VersionError};

/// Errors raised while enumerating deployment targets.
///
/// Every variant is a configuration problem: the rollout never starts.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InventoryError {
    #[snafu(display("failed to read inventory file {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{}:{line}: {message}", path.display()))]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[snafu(display("{}:{line}: invalid version: {source}", path.display()))]
    InvalidVersion {
        path: PathBuf,
        line: usize,
        source: VersionError,
    },

    #[snafu(display("{}:{line}: invalid target id: {source}", path.display()))]
    InvalidTargetId {
        path: PathBuf,
        line: usize,
        source: TargetIdError,
    },

    #[snafu(display("{}:{line}: {source}", path.display()))]
    InvalidEndpoint {
        path: PathBuf,
        line: usize,
        source: ProbeError,
    },

    #[snafu(display("inventory {origin}: target {id}: {reason}"))]
    InvalidTarget {
        origin: String,
        id: String,
        reason: String,
    },

    #[snafu(display("inventory {origin} contains no targets"))]
    Empty { origin: String },

    #[snafu(display("duplicate target in inventory: {id}"))]
    DuplicateTarget { id: TargetId },
}

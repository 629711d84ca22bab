// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod deployment_name;
mod id;
mod version;

pub use deployment_name::{DeploymentName, DeploymentNameError};
pub use id::{Id, RolloutId, TargetId, TargetIdError};
pub use version::{Version, VersionError};

// ABOUTME: Deployment target inventory: the ordered list of instances to roll out.
// ABOUTME: Exposes the InventoryProvider trait and its static and file-backed implementations.

mod error;
mod file;
mod static_inventory;

pub use error::InventoryError;
pub use file::FileInventory;
pub use static_inventory::StaticInventory;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;

use crate::health::validate_endpoint;
use crate::types::{TargetId, Version};

/// A single deployable unit (server, pod, instance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// Unique identifier within the inventory.
    pub id: TargetId,
    /// Version running on the target when the inventory was read.
    pub version: Version,
    /// URI probed to decide whether the target is healthy.
    pub health_endpoint: String,
}

impl Target {
    pub fn new(id: impl Into<String>, version: Version, health_endpoint: impl Into<String>) -> Self {
        Self {
            id: TargetId::new(id),
            version,
            health_endpoint: health_endpoint.into(),
        }
    }
}

/// Supplies the ordered list of deployment targets.
///
/// Implementations must return the same order on every call: ordering decides
/// batch membership, and therefore which targets are exposed first.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn list_targets(&self) -> Result<Vec<Target>, InventoryError>;
}

/// Health endpoint template with a `{target}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplate(String);

impl EndpointTemplate {
    pub const PLACEHOLDER: &'static str = "{target}";

    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn render(&self, id: &TargetId) -> String {
        self.0.replace(Self::PLACEHOLDER, id.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reject empty inventories, duplicate or unsafe ids, and endpoints that cannot be probed.
pub(crate) fn validate_targets(origin: &str, targets: &[Target]) -> Result<(), InventoryError> {
    if targets.is_empty() {
        return error::EmptySnafu { origin }.fail();
    }

    let mut seen = HashSet::with_capacity(targets.len());
    for target in targets {
        if let Err(e) = TargetId::parse(target.id.as_str()) {
            return error::InvalidTargetSnafu {
                origin,
                id: target.id.as_str(),
                reason: e.to_string(),
            }
            .fail();
        }
        if let Err(e) = validate_endpoint(&target.health_endpoint) {
            return error::InvalidTargetSnafu {
                origin,
                id: target.id.as_str(),
                reason: e.to_string(),
            }
            .fail();
        }
        if !seen.insert(&target.id) {
            return error::DuplicateTargetSnafu {
                id: target.id.clone(),
            }
            .fail();
        }
    }

    Ok(())
}

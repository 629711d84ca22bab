// ABOUTME: Inventory backed by a fixed target list from the configuration file.
// ABOUTME: Returns targets in declaration order.

use async_trait::async_trait;

use super::{InventoryError, InventoryProvider, Target, validate_targets};

/// Targets declared inline in `tranche.yml`.
#[derive(Debug, Clone)]
pub struct StaticInventory {
    targets: Vec<Target>,
}

impl StaticInventory {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl InventoryProvider for StaticInventory {
    async fn list_targets(&self) -> Result<Vec<Target>, InventoryError> {
        validate_targets("configuration", &self.targets)?;
        Ok(self.targets.clone())
    }
}

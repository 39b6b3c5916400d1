//! The inventory capability consumed by the reaper.
//!
//! `list` returns a point-in-time snapshot. `update` writes back a single
//! record and must be safe to call concurrently for distinct instances.
//! Callers cancel an in-flight call by dropping its future.

use async_trait::async_trait;

use crate::error::InventoryResult;
use crate::store::StateStore;
use crate::types::Instance;

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Snapshot of every tracked instance.
    async fn list(&self) -> InventoryResult<Vec<Instance>>;

    /// Persist a mutated instance record.
    async fn update(&self, instance: &Instance) -> InventoryResult<()>;
}

#[async_trait]
impl Inventory for StateStore {
    async fn list(&self) -> InventoryResult<Vec<Instance>> {
        self.list_instances()
    }

    async fn update(&self, instance: &Instance) -> InventoryResult<()> {
        self.update_instance(instance)
    }
}

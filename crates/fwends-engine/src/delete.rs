//! # Scoped Deletion
//!
//! Removes slots at pack, role or pair granularity. The catalog deletes the
//! matching rows (and, for a whole pack, the pack row) in one serializable
//! transaction, recomputing the digest when the pack survives. Every removed
//! resource is then handed to the prune queue.

use fwends_core::{PackId, RoleId, StringId};
use fwends_store::SlotScope;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::lifecycle::ResourceLifecycle;

impl Engine {
    /// Delete a pack and all of its slots.
    pub async fn delete_pack(&self, pack: PackId) -> Result<usize, EngineError> {
        self.remove(pack, SlotScope::Pack).await
    }

    /// Delete every slot under one role.
    pub async fn delete_role(&self, pack: PackId, role: &str) -> Result<usize, EngineError> {
        let role = RoleId::new(role)?;
        self.remove(pack, SlotScope::Role(role)).await
    }

    /// Delete every class under one `(role, string)` pair.
    pub async fn delete_pair(
        &self,
        pack: PackId,
        role: &str,
        string: &str,
    ) -> Result<usize, EngineError> {
        let role = RoleId::new(role)?;
        let string = StringId::new(string)?;
        self.remove(pack, SlotScope::Pair(role, string)).await
    }

    async fn remove(&self, pack: PackId, scope: SlotScope) -> Result<usize, EngineError> {
        let engine = self.clone();
        tokio::spawn(async move {
            let removed = engine
                .retry
                .run("remove_slots", || engine.catalog.remove_slots(pack, &scope))
                .await?;
            for slot in &removed {
                engine
                    .pruner
                    .schedule(ResourceLifecycle::committed(slot.resource));
            }
            tracing::info!(pack_id = %pack, scope = ?scope, removed = removed.len(), "slots deleted");
            Ok::<_, EngineError>(removed.len())
        })
        .await?
    }
}

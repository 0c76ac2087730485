//! # Upload Transaction
//!
//! Points a slot at a freshly uploaded blob without a transaction spanning
//! the catalog and the blob store:
//!
//! 1. validate the slot coordinates and derive the class from the content type,
//! 2. check the pack exists,
//! 3. mint a resource id and record its marker row (outside the slot
//!    transaction, so it survives an abort),
//! 4. write the blob under the new id,
//! 5. swap the slot in a serializable transaction, retried on conflict,
//! 6. queue the replaced resource, if any, for pruning.
//!
//! From step 3 until the swap commits, an [`UploadGuard`] owns the new id.
//! If the guard is dropped first, for any reason, the resource is queued for
//! pruning.

use bytes::Bytes;
use fwends_core::{PackId, ResourceClass, ResourceId, RoleId, SlotKey, StringId};
use fwends_store::Blob;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::lifecycle::{ResourceLifecycle, ResourceState};
use crate::prune::Pruner;

/// Owns a not-yet-committed resource and prunes it on drop.
pub struct UploadGuard {
    resource: ResourceLifecycle,
    pruner: Pruner,
}

impl UploadGuard {
    /// Take ownership of a freshly minted id.
    pub fn new(id: ResourceId, pruner: Pruner) -> Self {
        Self {
            resource: ResourceLifecycle::new(id),
            pruner,
        }
    }

    /// The guarded id.
    pub fn id(&self) -> ResourceId {
        self.resource.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResourceState {
        self.resource.state()
    }

    /// Advance the guarded resource.
    pub fn advance(&mut self, to: ResourceState) -> Result<(), EngineError> {
        Ok(self.resource.advance(to)?)
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if !self.resource.state().needs_prune() {
            return;
        }
        if self.resource.state() != ResourceState::Abandoned {
            if let Err(e) = self.resource.advance(ResourceState::Abandoned) {
                tracing::error!(error = %e, "could not abandon upload");
                return;
            }
        }
        tracing::info!(resource_id = %self.resource.id(), "upload not committed; scheduling prune");
        self.pruner.schedule(self.resource.clone());
    }
}

impl Engine {
    /// Upload `bytes` into the `(pack, role, string)` slot of the class that
    /// `content_type` maps to. Returns the new resource id.
    pub async fn upload(
        &self,
        pack: PackId,
        role: &str,
        string: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<ResourceId, EngineError> {
        let role = RoleId::new(role)?;
        let string = StringId::new(string)?;
        let class = ResourceClass::from_content_type(content_type)?;

        if !self.catalog.pack_exists(pack).await? {
            return Err(EngineError::NotFound(format!("pack {pack} not found")));
        }

        let key = SlotKey {
            pack,
            role,
            string,
            class,
        };
        let blob = Blob::new(content_type, bytes);

        // Detached from the caller: a dropped request must not abort the
        // slot transaction halfway.
        let engine = self.clone();
        tokio::spawn(async move { engine.commit_upload(key, blob).await }).await?
    }

    async fn commit_upload(&self, key: SlotKey, blob: Blob) -> Result<ResourceId, EngineError> {
        let mut guard = UploadGuard::new(self.ids.next_resource_id(), self.pruner.clone());
        let id = guard.id();

        self.catalog.record_resource(id).await?;
        guard.advance(ResourceState::Recorded)?;

        let size = blob.len();
        if let Err(e) = self.blobs.put(id, blob).await {
            tracing::error!(resource_id = %id, slot = %key, error = %e, "blob upload failed");
            return Err(EngineError::Internal(format!("blob upload failed: {e}")));
        }
        guard.advance(ResourceState::BlobWritten)?;

        let previous = self
            .retry
            .run("swap_slot", || self.catalog.swap_slot(&key, id))
            .await?;
        guard.advance(ResourceState::Committed)?;

        if let Some(previous) = previous {
            self.pruner.schedule(ResourceLifecycle::committed(previous));
        }
        tracing::info!(resource_id = %id, slot = %key, size, replaced = ?previous, "resource uploaded");
        Ok(id)
    }
}

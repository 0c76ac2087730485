//! In-memory blob store with failure injection.

use std::collections::HashMap;

use async_trait::async_trait;
use fwends_core::ResourceId;
use parking_lot::RwLock;

use super::{Blob, BlobStore};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Faults {
    failing_puts: usize,
    failing_deletes: usize,
}

/// Blob store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<ResourceId, Blob>>,
    faults: RwLock<Faults>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` puts.
    pub fn fail_next_puts(&self, n: usize) {
        self.faults.write().failing_puts += n;
    }

    /// Fail the next `n` deletes.
    pub fn fail_next_deletes(&self, n: usize) {
        self.faults.write().failing_deletes += n;
    }

    /// Whether an object exists under `id`.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.objects.read().contains_key(&id)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Sorted ids of all stored objects.
    pub fn ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self.objects.read().keys().copied().collect();
        ids.sort();
        ids
    }

    fn take_fault(counter: &mut usize, op: &str, id: ResourceId) -> StoreResult<()> {
        if *counter > 0 {
            *counter -= 1;
            return Err(StoreError::Unavailable(format!("injected {op} failure for {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, id: ResourceId, blob: Blob) -> StoreResult<()> {
        Self::take_fault(&mut self.faults.write().failing_puts, "put", id)?;
        self.objects.write().insert(id, blob);
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> StoreResult<Option<Blob>> {
        Ok(self.objects.read().get(&id).cloned())
    }

    async fn delete(&self, id: ResourceId) -> StoreResult<()> {
        Self::take_fault(&mut self.faults.write().failing_deletes, "delete", id)?;
        self.objects.write().remove(&id);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

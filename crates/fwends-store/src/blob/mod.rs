//! # Blob Store
//!
//! Key/value storage for resource payloads. Keys are the decimal form of the
//! resource id ([`ResourceId::object_key`]). There are no transactions; the
//! engine's marker tables cover the gap.
//!
//! [`ResourceId::object_key`]: fwends_core::ResourceId::object_key

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use fwends_core::ResourceId;

use crate::error::StoreResult;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

/// A stored payload and the content type it was uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Original `Content-Type` of the upload.
    pub content_type: String,
    /// Payload bytes.
    pub bytes: Bytes,
}

impl Blob {
    /// Build a blob from a content type and payload.
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Object storage for resource payloads.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store a payload, overwriting any existing object under the same id.
    async fn put(&self, id: ResourceId, blob: Blob) -> StoreResult<()>;

    /// Fetch a payload. `Ok(None)` when absent.
    async fn get(&self, id: ResourceId) -> StoreResult<Option<Blob>>;

    /// Delete a payload. Deleting an absent object succeeds.
    async fn delete(&self, id: ResourceId) -> StoreResult<()>;

    /// Connectivity probe.
    async fn ping(&self) -> StoreResult<()>;
}

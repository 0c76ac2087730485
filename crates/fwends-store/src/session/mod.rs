//! # Session Cache
//!
//! A TTL-bounded existence cache. Sessions carry no payload; a key either
//! exists (live session) or does not.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

pub use memory::MemorySessionCache;

/// Key/TTL existence cache.
#[async_trait]
pub trait SessionCache: Send + Sync + 'static {
    /// Whether `key` exists and has not expired.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Create `key` with the given lifetime only if it does not already
    /// exist. Returns `false` when the key was already present.
    async fn set_nx(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Connectivity probe.
    async fn ping(&self) -> StoreResult<()>;
}

//! In-memory session cache.
//!
//! Backed by a `moka` cache whose per-entry expiry is the TTL passed to
//! [`SessionCache::set_nx`]. Expired entries are invisible to lookups
//! immediately and are evicted by moka's housekeeping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;

use super::SessionCache;
use crate::error::{StoreError, StoreResult};

/// Expires each entry after the TTL stored as its value.
struct TtlExpiry;

impl Expiry<String, Duration> for TtlExpiry {
    fn expire_after_create(&self, _key: &String, ttl: &Duration, _created_at: Instant) -> Option<Duration> {
        Some(*ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        ttl: &Duration,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(*ttl)
    }
}

/// Session cache backed by process memory.
pub struct MemorySessionCache {
    entries: Cache<String, Duration>,
    failing_calls: AtomicUsize,
}

impl std::fmt::Debug for MemorySessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl Default for MemorySessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().expire_after(TtlExpiry).build(),
            failing_calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: usize) {
        self.failing_calls.fetch_add(n, Ordering::SeqCst);
    }

    /// Entries held as of the last housekeeping pass.
    pub fn len(&self) -> usize {
        usize::try_from(self.entries.entry_count()).unwrap_or(usize::MAX)
    }

    /// Whether the cache held no entries as of the last housekeeping pass.
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    /// Run pending housekeeping now, evicting expired entries.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    fn take_fault(&self) -> StoreResult<()> {
        let injected = self
            .failing_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected session cache failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.take_fault()?;
        Ok(self.entries.get(key).await.is_some())
    }

    async fn set_nx(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.take_fault()?;
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(async move { ttl })
            .await;
        Ok(entry.is_fresh())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.take_fault()
    }
}

//! The engine handle shared by every request.

use std::sync::Arc;

use fwends_core::SnowflakeGenerator;
use fwends_store::{BlobStore, PackCatalog};

use crate::prune::Pruner;
use crate::retry::RetryPolicy;

/// Tunables for [`Engine::start`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Serialization retry policy for slot and marker transactions.
    pub retry: RetryPolicy,
    /// Resources reclaimed concurrently by the prune queue.
    pub prune_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            prune_concurrency: 8,
        }
    }
}

/// Pack resource lifecycle engine.
///
/// Holds shared handles to the catalog, the blob store, the id generator and
/// the prune queue. Cloning is cheap.
#[derive(Clone)]
pub struct Engine {
    pub(crate) catalog: Arc<dyn PackCatalog>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) ids: Arc<SnowflakeGenerator>,
    pub(crate) pruner: Pruner,
    pub(crate) retry: RetryPolicy,
}

impl Engine {
    /// Build the engine and start its prune queue. Must be called from
    /// within a tokio runtime.
    pub fn start(
        catalog: Arc<dyn PackCatalog>,
        blobs: Arc<dyn BlobStore>,
        ids: Arc<SnowflakeGenerator>,
        config: EngineConfig,
    ) -> Self {
        let pruner = Pruner::start(
            Arc::clone(&catalog),
            Arc::clone(&blobs),
            config.retry.clone(),
            config.prune_concurrency,
        );
        Self {
            catalog,
            blobs,
            ids,
            pruner,
            retry: config.retry,
        }
    }

    /// The relational catalog.
    pub fn catalog(&self) -> &Arc<dyn PackCatalog> {
        &self.catalog
    }

    /// The blob store.
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// The background prune queue.
    pub fn pruner(&self) -> &Pruner {
        &self.pruner
    }

    /// Stop the prune queue after draining it.
    pub async fn shutdown(&self) {
        self.pruner.shutdown().await;
    }
}

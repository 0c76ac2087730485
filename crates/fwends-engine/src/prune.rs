//! # Prune Queue
//!
//! Background reclamation of resources that no slot references any more:
//! abandoned uploads, replaced resources, and the slots of deleted packs,
//! roles and pairs.
//!
//! Reclaiming one resource is three steps, each idempotent:
//!
//! 1. move the marker from `resources` to `pruned_resources` (serializable,
//!    retried on conflict),
//! 2. delete the blob,
//! 3. drop the `pruned_resources` row.
//!
//! A failure after step 1 leaves the id in `pruned_resources`, where
//! [`Pruner::sweep_backlog`] finds it on the next start.
//!
//! The queue owns its own tasks. Scheduling never blocks and never fails the
//! caller; prune errors are logged.

use std::sync::Arc;

use fwends_core::ResourceId;
use fwends_store::{BlobStore, PackCatalog};
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::error::EngineError;
use crate::lifecycle::{ResourceLifecycle, ResourceState};
use crate::retry::RetryPolicy;

enum Job {
    Prune(ResourceLifecycle),
    Shutdown,
}

struct PruneContext {
    catalog: Arc<dyn PackCatalog>,
    blobs: Arc<dyn BlobStore>,
    retry: RetryPolicy,
}

impl PruneContext {
    async fn reclaim(&self, id: ResourceId) -> Result<(), EngineError> {
        let moved = self
            .retry
            .run("mark_pruned", || self.catalog.mark_pruned(id))
            .await?;
        if !moved {
            tracing::debug!(resource_id = %id, "resource marker already moved");
        }
        self.blobs.delete(id).await?;
        self.catalog.forget_pruned(id).await?;
        Ok(())
    }

    async fn prune(&self, mut resource: ResourceLifecycle) {
        let id = resource.id();
        match self.reclaim(id).await {
            Ok(()) => match resource.advance(ResourceState::Pruned) {
                Ok(()) => tracing::debug!(resource_id = %id, "resource pruned"),
                Err(e) => tracing::warn!(error = %e, "pruned resource from unexpected state"),
            },
            Err(e) => tracing::warn!(
                resource_id = %id,
                state = %resource.state(),
                error = %e,
                "prune failed; marker left for reconciliation"
            ),
        }
    }
}

/// Handle to the background prune queue.
///
/// Cloning is cheap; all clones feed the same worker.
#[derive(Clone)]
pub struct Pruner {
    jobs: mpsc::UnboundedSender<Job>,
    in_flight: Arc<watch::Sender<usize>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    catalog: Arc<dyn PackCatalog>,
}

impl Pruner {
    /// Start the worker. At most `concurrency` resources are reclaimed at
    /// once. Must be called from within a tokio runtime.
    pub fn start(
        catalog: Arc<dyn PackCatalog>,
        blobs: Arc<dyn BlobStore>,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let (in_flight, _) = watch::channel(0usize);
        let in_flight = Arc::new(in_flight);
        let ctx = Arc::new(PruneContext {
            catalog: Arc::clone(&catalog),
            blobs,
            retry,
        });
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let worker = tokio::spawn(run_worker(rx, ctx, permits, Arc::clone(&in_flight)));
        Self {
            jobs,
            in_flight,
            worker: Arc::new(Mutex::new(Some(worker))),
            catalog,
        }
    }

    /// Queue a resource for reclamation.
    pub fn schedule(&self, resource: ResourceLifecycle) {
        let id = resource.id();
        self.in_flight.send_modify(|n| *n += 1);
        if self.jobs.send(Job::Prune(resource)).is_err() {
            self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
            tracing::warn!(resource_id = %id, "prune queue closed; marker left for reconciliation");
        }
    }

    /// Jobs queued or running.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until every scheduled job has finished.
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        // The sender lives in `self`, so this only fails if it was dropped.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Re-queue every id left in `pruned_resources` by an earlier process.
    pub async fn sweep_backlog(&self) -> Result<usize, EngineError> {
        let backlog = self.catalog.pruned_backlog().await?;
        let count = backlog.len();
        for id in backlog {
            self.schedule(ResourceLifecycle::abandoned(id));
        }
        if count > 0 {
            tracing::info!(count, "re-scheduled pruned resource backlog");
        }
        Ok(count)
    }

    /// Stop accepting work, finish everything already queued, and wait for
    /// the worker to exit.
    pub async fn shutdown(&self) {
        let _ = self.jobs.send(Job::Shutdown);
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "prune worker panicked");
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Job>,
    ctx: Arc<PruneContext>,
    permits: Arc<Semaphore>,
    in_flight: Arc<watch::Sender<usize>>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Prune(resource) => dispatch(resource, &ctx, &permits, &in_flight).await,
            Job::Shutdown => break,
        }
    }

    rx.close();
    while let Ok(job) = rx.try_recv() {
        if let Job::Prune(resource) = job {
            dispatch(resource, &ctx, &permits, &in_flight).await;
        }
    }

    let mut idle = in_flight.subscribe();
    let _ = idle.wait_for(|n| *n == 0).await;
    tracing::info!("prune queue drained");
}

async fn dispatch(
    resource: ResourceLifecycle,
    ctx: &Arc<PruneContext>,
    permits: &Arc<Semaphore>,
    in_flight: &Arc<watch::Sender<usize>>,
) {
    let Ok(permit) = Arc::clone(permits).acquire_owned().await else {
        in_flight.send_modify(|n| *n = n.saturating_sub(1));
        return;
    };
    let ctx = Arc::clone(ctx);
    let in_flight = Arc::clone(in_flight);
    tokio::spawn(async move {
        ctx.prune(resource).await;
        drop(permit);
        in_flight.send_modify(|n| *n = n.saturating_sub(1));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwends_store::{Blob, MemoryBlobStore, MemoryCatalog};

    fn id(n: i64) -> ResourceId {
        ResourceId::new(n).unwrap()
    }

    fn setup() -> (Arc<MemoryCatalog>, Arc<MemoryBlobStore>, Pruner) {
        let catalog = Arc::new(MemoryCatalog::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let pruner = Pruner::start(catalog.clone(), blobs.clone(), RetryPolicy::immediate(8), 4);
        (catalog, blobs, pruner)
    }

    #[tokio::test]
    async fn prune_clears_marker_and_blob() {
        let (catalog, blobs, pruner) = setup();
        catalog.record_resource(id(1)).await.unwrap();
        blobs.put(id(1), Blob::new("image/png", &b"x"[..])).await.unwrap();

        pruner.schedule(ResourceLifecycle::committed(id(1)));
        pruner.wait_idle().await;

        assert!(!blobs.contains(id(1)));
        assert!(catalog.recorded_resources().is_empty());
        assert!(catalog.pruned_resources().is_empty());
    }

    #[tokio::test]
    async fn prune_is_idempotent() {
        let (catalog, blobs, pruner) = setup();
        catalog.record_resource(id(2)).await.unwrap();
        blobs.put(id(2), Blob::new("audio/aac", &b"a"[..])).await.unwrap();

        pruner.schedule(ResourceLifecycle::committed(id(2)));
        pruner.schedule(ResourceLifecycle::committed(id(2)));
        pruner.wait_idle().await;
        pruner.schedule(ResourceLifecycle::abandoned(id(2)));
        pruner.wait_idle().await;

        assert!(blobs.is_empty());
        assert!(catalog.pruned_resources().is_empty());
    }

    #[tokio::test]
    async fn conflicts_on_marker_move_are_retried() {
        let (catalog, _blobs, pruner) = setup();
        catalog.record_resource(id(3)).await.unwrap();
        catalog.inject_conflicts(3);

        pruner.schedule(ResourceLifecycle::abandoned(id(3)));
        pruner.wait_idle().await;

        assert_eq!(catalog.conflicts_raised(), 3);
        assert!(catalog.recorded_resources().is_empty());
    }

    #[tokio::test]
    async fn blob_failure_leaves_backlog_for_sweep() {
        let (catalog, blobs, pruner) = setup();
        catalog.record_resource(id(4)).await.unwrap();
        blobs.put(id(4), Blob::new("image/png", &b"x"[..])).await.unwrap();
        blobs.fail_next_deletes(1);

        pruner.schedule(ResourceLifecycle::committed(id(4)));
        pruner.wait_idle().await;
        assert_eq!(catalog.pruned_resources(), vec![id(4)]);
        assert!(blobs.contains(id(4)));

        assert_eq!(pruner.sweep_backlog().await.unwrap(), 1);
        pruner.wait_idle().await;
        assert!(catalog.pruned_resources().is_empty());
        assert!(!blobs.contains(id(4)));
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let (catalog, blobs, pruner) = setup();
        for n in 10..30 {
            catalog.record_resource(id(n)).await.unwrap();
            blobs.put(id(n), Blob::new("image/png", &b"x"[..])).await.unwrap();
            pruner.schedule(ResourceLifecycle::abandoned(id(n)));
        }
        pruner.shutdown().await;

        assert_eq!(pruner.in_flight(), 0);
        assert!(blobs.is_empty());
        assert!(catalog.recorded_resources().is_empty());

        // scheduling after shutdown is dropped without panicking
        pruner.schedule(ResourceLifecycle::abandoned(id(99)));
        assert_eq!(pruner.in_flight(), 0);
    }
}

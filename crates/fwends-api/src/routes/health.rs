//! # Health API
//!
//! Probes the catalog, the blob store and the session cache concurrently,
//! each bounded by [`PROBE_TIMEOUT`]. The endpoint itself always answers
//! 200; the body says which dependency is up.

use std::future::Future;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use fwends_store::StoreResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// Upper bound on a single dependency probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-dependency status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServiceHealth {
    pub catalog: bool,
    pub blobs: bool,
    pub sessions: bool,
}

/// Body of `GET /api/health`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub services: ServiceHealth,
}

/// Build the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

/// Run one probe under [`PROBE_TIMEOUT`].
pub(crate) async fn probe<F>(service: &'static str, check: F) -> bool
where
    F: Future<Output = StoreResult<()>>,
{
    match tokio::time::timeout(PROBE_TIMEOUT, check).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(service, error = %e, "health check failed");
            false
        }
        Err(_) => {
            tracing::error!(service, "health check timed out");
            false
        }
    }
}

/// GET /api/health: Dependency status.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Dependency status", body = HealthResponse),
    ),
    tag = "health"
)]
pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (catalog, blobs, sessions) = tokio::join!(
        probe("catalog", state.engine.catalog().ping()),
        probe("blobs", state.engine.blobs().ping()),
        probe("sessions", state.sessions().cache().ping()),
    );
    Json(HealthResponse {
        services: ServiceHealth {
            catalog,
            blobs,
            sessions,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwends_store::StoreError;

    #[tokio::test]
    async fn probe_outcomes() {
        assert!(probe("ok", async { Ok(()) }).await);
        assert!(!probe("down", async { Err(StoreError::Unavailable("down".into())) }).await);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        };
        assert!(!probe("slow", slow).await);
    }
}

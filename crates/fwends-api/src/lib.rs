//! # fwends-api: HTTP Service for Packs
//!
//! ## API Surface
//!
//! | Prefix            | Module                 | Domain                      |
//! |-------------------|------------------------|-----------------------------|
//! | `/api/packs/*`    | [`routes::packs`]      | Pack CRUD, upload, deletion |
//! | `/media/packs/*`  | [`routes::media`]      | Resource reads              |
//! | `/api/auth*`      | [`routes::auth`]       | Sessions                    |
//! | `/api/health`     | [`routes::health`]     | Dependency status           |
//! | `/health/*`       | this module            | Liveness and readiness      |
//! | `/openapi.json`   | [`openapi`]            | OpenAPI document            |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → expose_internal_details → require_session (packs only) → Handler
//! ```

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, map_response_with_state};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Only the pack routes sit behind the session middleware, and it lets
/// reads through.
pub fn app(state: AppState) -> Router {
    let packs = routes::packs::router()
        .layer(from_fn_with_state(state.clone(), auth::require_session));

    Router::new()
        .merge(packs)
        .merge(routes::media::router())
        .merge(routes::auth::router())
        .merge(routes::health::router())
        .merge(openapi::router())
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .layer(map_response_with_state(
            state.clone(),
            error::expose_internal_details,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once the catalog answers, 503 otherwise.
async fn readiness(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    if routes::health::probe("catalog", state.engine.catalog().ping()).await {
        Ok("ready")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "fwends API",
        version = "0.1.0",
        description = "Packs of image and audio resources addressed by role and string."
    ),
    paths(
        // Packs
        crate::routes::packs::list_packs,
        crate::routes::packs::create_pack,
        crate::routes::packs::get_pack,
        crate::routes::packs::rename_pack,
        crate::routes::packs::delete_pack,
        crate::routes::packs::delete_role,
        crate::routes::packs::delete_pair,
        crate::routes::packs::upload_resource,
        // Media
        crate::routes::media::read_media,
        // Auth
        crate::routes::auth::auth_config,
        crate::routes::auth::verify_session,
        crate::routes::auth::authenticate,
        // Health
        crate::routes::health::health,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::packs::PackTitleRequest,
        crate::routes::packs::CreatePackResponse,
        crate::routes::packs::PackSummaryResponse,
        crate::routes::packs::PackResponse,
        crate::routes::packs::RoleResponse,
        crate::routes::packs::StringResponse,
        crate::routes::auth::AuthConfigResponse,
        crate::routes::auth::AuthenticateRequest,
        crate::routes::health::HealthResponse,
        crate::routes::health::ServiceHealth,
    )),
    tags(
        (name = "packs", description = "Pack CRUD, upload and deletion"),
        (name = "media", description = "Resource reads"),
        (name = "auth", description = "Sessions"),
        (name = "health", description = "Dependency status"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

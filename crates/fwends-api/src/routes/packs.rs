//! # Pack API
//!
//! Pack CRUD, resource upload, and deletion at pack, role and pair
//! granularity. Mutating routes sit behind the session middleware.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use bytes::Bytes;
use fwends_core::{PackDigest, PackId, ResourceId, RoleId, StringId};
use fwends_engine::{CreatedPack, PackView, RoleView, StringView};
use fwends_store::PackSummary;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_path, parse_pack_id};
use crate::state::AppState;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Request to create or rename a pack.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PackTitleRequest {
    /// Non-empty pack title.
    pub title: String,
}

/// Response to pack creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePackResponse {
    /// Decimal pack id, string-encoded.
    #[schema(value_type = String)]
    pub id: PackId,
    /// Hex content hash of the empty pack.
    #[schema(value_type = String)]
    pub hash: PackDigest,
}

impl From<CreatedPack> for CreatePackResponse {
    fn from(created: CreatedPack) -> Self {
        Self {
            id: created.id,
            hash: created.hash,
        }
    }
}

/// One row of the pack listing.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackSummaryResponse {
    #[schema(value_type = String)]
    pub id: PackId,
    pub title: String,
    #[schema(value_type = String)]
    pub hash: PackDigest,
    /// Distinct roles with at least one resource.
    pub role_count: i64,
    /// Distinct `(role, string)` pairs with at least one resource.
    pub string_count: i64,
}

impl From<PackSummary> for PackSummaryResponse {
    fn from(s: PackSummary) -> Self {
        Self {
            id: s.id,
            title: s.title,
            hash: s.hash,
            role_count: s.role_count,
            string_count: s.string_count,
        }
    }
}

/// A string and the resources it holds.
#[derive(Debug, Serialize, ToSchema)]
pub struct StringResponse {
    #[schema(value_type = String)]
    pub id: StringId,
    /// Image resource id, string-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub image: Option<ResourceId>,
    /// Audio resource id, string-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub audio: Option<ResourceId>,
}

/// A role and its strings, ordered by id.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    #[schema(value_type = String)]
    pub id: RoleId,
    pub strings: Vec<StringResponse>,
}

/// A pack with its role/string tree.
#[derive(Debug, Serialize, ToSchema)]
pub struct PackResponse {
    pub title: String,
    #[schema(value_type = String)]
    pub hash: PackDigest,
    pub roles: Vec<RoleResponse>,
}

impl From<StringView> for StringResponse {
    fn from(v: StringView) -> Self {
        Self {
            id: v.id,
            image: v.image,
            audio: v.audio,
        }
    }
}

impl From<RoleView> for RoleResponse {
    fn from(v: RoleView) -> Self {
        Self {
            id: v.id,
            strings: v.strings.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<PackView> for PackResponse {
    fn from(v: PackView) -> Self {
        Self {
            title: v.title,
            hash: v.hash,
            roles: v.roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Build the packs router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/packs", get(list_packs).post(create_pack))
        .route(
            "/api/packs/:pack",
            get(get_pack).put(rename_pack).delete(delete_pack),
        )
        .route("/api/packs/:pack/:role", delete(delete_role))
        .route(
            "/api/packs/:pack/:role/:string",
            put(upload_resource)
                .delete(delete_pair)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

/// GET /api/packs: List pack summaries.
#[utoipa::path(
    get,
    path = "/api/packs",
    responses(
        (status = 200, description = "Pack summaries", body = Vec<PackSummaryResponse>),
    ),
    tag = "packs"
)]
pub(crate) async fn list_packs(
    State(state): State<AppState>,
) -> Result<Json<Vec<PackSummaryResponse>>, AppError> {
    let packs = state.engine.list_packs().await?;
    Ok(Json(packs.into_iter().map(Into::into).collect()))
}

/// POST /api/packs: Create a pack.
#[utoipa::path(
    post,
    path = "/api/packs",
    request_body = PackTitleRequest,
    responses(
        (status = 200, description = "Pack created", body = CreatePackResponse),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
        (status = 401, description = "No live session", body = crate::error::ErrorBody),
        (status = 422, description = "Empty title", body = crate::error::ErrorBody),
    ),
    tag = "packs"
)]
pub(crate) async fn create_pack(
    State(state): State<AppState>,
    body: Result<Json<PackTitleRequest>, JsonRejection>,
) -> Result<Json<CreatePackResponse>, AppError> {
    let req = extract_json(body)?;
    let created = state.engine.create_pack(&req.title).await?;
    Ok(Json(created.into()))
}

/// GET /api/packs/{pack}: Read a pack's title, hash and resources.
#[utoipa::path(
    get,
    path = "/api/packs/{pack}",
    params(("pack" = String, Path, description = "Pack ID")),
    responses(
        (status = 200, description = "Pack found", body = PackResponse),
        (status = 400, description = "Invalid pack id", body = crate::error::ErrorBody),
        (status = 404, description = "Pack not found", body = crate::error::ErrorBody),
    ),
    tag = "packs"
)]
pub(crate) async fn get_pack(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<PackResponse>, AppError> {
    let pack = parse_pack_id(&extract_path(path)?)?;
    let view = state.engine.get_pack(pack).await?;
    Ok(Json(view.into()))
}

/// PUT /api/packs/{pack}: Rename a pack.
#[utoipa::path(
    put,
    path = "/api/packs/{pack}",
    params(("pack" = String, Path, description = "Pack ID")),
    request_body = PackTitleRequest,
    responses(
        (status = 200, description = "Pack renamed"),
        (status = 404, description = "Pack not found", body = crate::error::ErrorBody),
        (status = 422, description = "Empty title", body = crate::error::ErrorBody),
    ),
    tag = "packs"
)]
pub(crate) async fn rename_pack(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<PackTitleRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let pack = parse_pack_id(&extract_path(path)?)?;
    let req = extract_json(body)?;
    state.engine.rename_pack(pack, &req.title).await?;
    Ok(StatusCode::OK)
}

/// DELETE /api/packs/{pack}: Delete a pack and all its resources.
#[utoipa::path(
    delete,
    path = "/api/packs/{pack}",
    params(("pack" = String, Path, description = "Pack ID")),
    responses(
        (status = 200, description = "Pack deleted"),
        (status = 404, description = "Pack not found", body = crate::error::ErrorBody),
    ),
    tag = "packs"
)]
pub(crate) async fn delete_pack(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let pack = parse_pack_id(&extract_path(path)?)?;
    state.engine.delete_pack(pack).await?;
    Ok(StatusCode::OK)
}

/// DELETE /api/packs/{pack}/{role}: Delete every resource of a role.
#[utoipa::path(
    delete,
    path = "/api/packs/{pack}/{role}",
    params(
        ("pack" = String, Path, description = "Pack ID"),
        ("role" = String, Path, description = "Role ID"),
    ),
    responses(
        (status = 200, description = "Role deleted"),
        (status = 404, description = "Pack or role not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid role id", body = crate::error::ErrorBody),
    ),
    tag = "packs"
)]
pub(crate) async fn delete_role(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let (pack, role) = extract_path(path)?;
    let pack = parse_pack_id(&pack)?;
    state.engine.delete_role(pack, &role).await?;
    Ok(StatusCode::OK)
}

/// DELETE /api/packs/{pack}/{role}/{string}: Delete both classes of a pair.
#[utoipa::path(
    delete,
    path = "/api/packs/{pack}/{role}/{string}",
    params(
        ("pack" = String, Path, description = "Pack ID"),
        ("role" = String, Path, description = "Role ID"),
        ("string" = String, Path, description = "String ID"),
    ),
    responses(
        (status = 200, description = "Pair deleted"),
        (status = 404, description = "Pack or pair not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid identifier", body = crate::error::ErrorBody),
    ),
    tag = "packs"
)]
pub(crate) async fn delete_pair(
    State(state): State<AppState>,
    path: Result<Path<(String, String, String)>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let (pack, role, string) = extract_path(path)?;
    let pack = parse_pack_id(&pack)?;
    state.engine.delete_pair(pack, &role, &string).await?;
    Ok(StatusCode::OK)
}

/// PUT /api/packs/{pack}/{role}/{string}: Upload an image or audio resource.
///
/// The `Content-Type` header selects the slot class. Responds with the new
/// resource id as a JSON string.
#[utoipa::path(
    put,
    path = "/api/packs/{pack}/{role}/{string}",
    params(
        ("pack" = String, Path, description = "Pack ID"),
        ("role" = String, Path, description = "Role ID"),
        ("string" = String, Path, description = "String ID"),
    ),
    request_body(content = Vec<u8>, description = "Resource bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Resource stored", body = String),
        (status = 404, description = "Pack not found", body = crate::error::ErrorBody),
        (status = 415, description = "Unsupported content type", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid identifier", body = crate::error::ErrorBody),
    ),
    tag = "packs"
)]
pub(crate) async fn upload_resource(
    State(state): State<AppState>,
    path: Result<Path<(String, String, String)>, PathRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ResourceId>, AppError> {
    let (pack, role, string) = extract_path(path)?;
    let pack = parse_pack_id(&pack)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let id = state
        .engine
        .upload(pack, &role, &string, content_type, body)
        .await?;
    Ok(Json(id))
}

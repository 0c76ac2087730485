//! # Media API
//!
//! Serves the blob currently held by a slot, with its stored content type.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::extractors::{extract_path, parse_pack_id};
use crate::state::AppState;

/// Build the media router.
pub fn router() -> Router<AppState> {
    Router::new().route("/media/packs/:pack/:role/:string/:class", get(read_media))
}

/// GET /media/packs/{pack}/{role}/{string}/{class}: Stream a slot's blob.
#[utoipa::path(
    get,
    path = "/media/packs/{pack}/{role}/{string}/{class}",
    params(
        ("pack" = String, Path, description = "Pack ID"),
        ("role" = String, Path, description = "Role ID"),
        ("string" = String, Path, description = "String ID"),
        ("class" = String, Path, description = "`image` or `audio`"),
    ),
    responses(
        (status = 200, description = "Resource bytes with the stored content type"),
        (status = 404, description = "Slot empty or blob missing", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid identifier or class", body = crate::error::ErrorBody),
    ),
    tag = "media"
)]
pub(crate) async fn read_media(
    State(state): State<AppState>,
    path: Result<Path<(String, String, String, String)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (pack, role, string, class) = extract_path(path)?;
    let pack = parse_pack_id(&pack)?;
    let blob = state.engine.read_media(pack, &role, &string, &class).await?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes))
}

//! # Extraction Helpers
//!
//! Map axum rejections and raw path segments to [`AppError`] so handlers
//! answer with the structured error body instead of axum's plain-text
//! rejections.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;
use fwends_core::PackId;

use crate::error::AppError;

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract path parameters, mapping rejections to [`AppError::BadRequest`].
pub fn extract_path<T>(result: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    result
        .map(|Path(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Parse a pack id path segment. Anything but a non-negative decimal
/// integer is a bad request.
pub fn parse_pack_id(raw: &str) -> Result<PackId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid pack id: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_ids() {
        assert_eq!(parse_pack_id("42").unwrap().get(), 42);
        assert!(matches!(parse_pack_id("abc"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_pack_id("-1"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_pack_id("+5"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_pack_id(""), Err(AppError::BadRequest(_))));
    }
}

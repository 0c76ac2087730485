//! # Authentication API
//!
//! Exchanges identity-provider tokens for session cookies and reports
//! whether the caller holds a live session.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::session_token;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Authentication settings advertised to clients.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthConfigResponse {
    /// Whether sessions are required for mutating requests.
    pub enable: bool,
    /// Identity services accepted by `POST /api/auth`.
    pub services: Vec<String>,
}

/// Request to exchange an identity token for a session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthenticateRequest {
    /// Opaque token issued by the identity service.
    pub token: String,
    /// Name of the identity service that issued the token.
    pub service: String,
}

/// Build the authentication router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/config", get(auth_config))
        .route("/api/auth", get(verify_session).post(authenticate))
}

fn require_enabled(state: &AppState) -> Result<(), AppError> {
    if state.config.auth_enable {
        Ok(())
    } else {
        Err(AppError::MisdirectedRequest("authentication is not enabled".into()))
    }
}

/// GET /api/auth/config: Authentication settings.
#[utoipa::path(
    get,
    path = "/api/auth/config",
    responses(
        (status = 200, description = "Authentication settings", body = AuthConfigResponse),
    ),
    tag = "auth"
)]
pub(crate) async fn auth_config(State(state): State<AppState>) -> Json<AuthConfigResponse> {
    Json(AuthConfigResponse {
        enable: state.config.auth_enable,
        services: state.authenticator.services(),
    })
}

/// GET /api/auth: Whether the session cookie names a live session.
#[utoipa::path(
    get,
    path = "/api/auth",
    responses(
        (status = 200, description = "Session status", body = bool),
        (status = 421, description = "Authentication disabled", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub(crate) async fn verify_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<bool>, AppError> {
    require_enabled(&state)?;
    let live = state.sessions().verify(session_token(&state, &jar)).await?;
    Ok(Json(live))
}

/// POST /api/auth: Exchange an identity token for a session cookie.
#[utoipa::path(
    post,
    path = "/api/auth",
    request_body = AuthenticateRequest,
    responses(
        (status = 200, description = "Session created; cookie set"),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
        (status = 401, description = "Token rejected or not an admin", body = crate::error::ErrorBody),
        (status = 421, description = "Authentication disabled", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub(crate) async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<AuthenticateRequest>, JsonRejection>,
) -> Result<CookieJar, AppError> {
    require_enabled(&state)?;
    let req = extract_json(body)?;
    let session = state
        .authenticator
        .authenticate(&req.service, &req.token)
        .await?;

    let max_age = i64::try_from(session.ttl.as_secs()).unwrap_or(i64::MAX);
    let cookie = Cookie::build((state.config.session_cookie.clone(), session.token))
        .path("/")
        .max_age(time::Duration::seconds(max_age))
        .secure(true)
        .http_only(true);
    Ok(jar.add(cookie))
}

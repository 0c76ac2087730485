//! # Session Middleware
//!
//! When authentication is enabled, every non-read request routed through
//! [`require_session`] must carry a session cookie naming a live session.
//! Reads (`GET`, `HEAD`, `OPTIONS`) stay public.

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use crate::error::AppError;
use crate::state::AppState;

/// The session token carried by the request, if any.
pub fn session_token<'a>(state: &AppState, jar: &'a CookieJar) -> Option<&'a str> {
    jar.get(&state.config.session_cookie).map(|c| c.value())
}

fn is_read(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Reject mutating requests without a live session.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.config.auth_enable || is_read(request.method()) {
        return Ok(next.run(request).await);
    }

    let token = session_token(&state, &jar);
    if !state.sessions().verify(token).await? {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            has_cookie = token.is_some(),
            "rejected request without a live session"
        );
        return Err(AppError::Unauthorized("a live session is required".into()));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_methods() {
        assert!(is_read(&Method::GET));
        assert!(is_read(&Method::HEAD));
        assert!(!is_read(&Method::PUT));
        assert!(!is_read(&Method::POST));
        assert!(!is_read(&Method::DELETE));
    }
}

//! services/panel/src/web/middleware.rs
//!
//! The session guard. No lead data is fetched or rendered for a request
//! that does not resolve to a live session; resolution failures deny access
//! rather than fall through.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::web::envelope::{port_error_response, ApiEnvelope};
use crate::web::sessions::{clear_session_cookie, session_id_from_cookies, SessionStore};
use crate::web::state::AppState;
use lead_review_core::domain::Identity;
use lead_review_core::ports::PortError;

/// The resolved session for one authorized request, placed in request
/// extensions by `require_auth`.
#[derive(Clone)]
pub struct CurrentSession {
    pub session_id: Uuid,
    pub identity: Identity,
}

/// Middleware that resolves the session cookie and extracts the identity.
///
/// If valid, inserts a `CurrentSession` into request extensions for handlers
/// to use. If invalid, missing, or expired, answers 401 with a cleared
/// cookie and never reaches the handler.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let session_id = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session_id_from_cookies)
        .ok_or_else(session_expired_response)?;

    let identity = state.sessions.lookup(session_id).await.ok_or_else(|| {
        warn!("Rejected request with unknown or expired session {}", session_id);
        session_expired_response()
    })?;

    req.extensions_mut().insert(CurrentSession {
        session_id,
        identity,
    });
    Ok(next.run(req).await)
}

/// 401 with the cookie cleared; the entry point back is the login page.
pub fn session_expired_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(ApiEnvelope::failure("Session expired. Please sign in again.")),
    )
        .into_response()
}

/// Turns a port failure from an authorized call into a reply. A downstream
/// `Unauthorized` means the bearer token died mid-session: the identity is
/// cleared before the 401 goes out, so the next request starts at login.
pub async fn authorized_failure(
    sessions: &SessionStore,
    session_id: Uuid,
    err: PortError,
) -> Response {
    if matches!(err, PortError::Unauthorized) {
        warn!("Upstream rejected the bearer token; ending session {}", session_id);
        sessions.remove(session_id).await;
        session_expired_response()
    } else {
        port_error_response(&err)
    }
}

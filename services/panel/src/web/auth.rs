//! services/panel/src/web/auth.rs
//!
//! Authentication endpoints: credential login, two-step OTP verification,
//! logout, and the password flows. The panel never checks a password itself;
//! credentials are forwarded to the upstream auth endpoints and only the
//! resulting identity is kept, server-side, in the session store.

use axum::{
    extract::{Extension, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::web::envelope::{failure_response, port_error_response, ApiEnvelope};
use crate::web::middleware::{authorized_failure, CurrentSession};
use crate::web::sessions::{clear_session_cookie, session_cookie};
use crate::web::state::AppState;
use lead_review_core::domain::{Identity, PasswordChange};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct OtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyResetTokenRequest {
    pub token: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl From<ChangePasswordRequest> for PasswordChange {
    fn from(req: ChangePasswordRequest) -> Self {
        PasswordChange {
            current_password: req.current_password,
            new_password: req.new_password,
            confirm_password: req.confirm_password,
        }
    }
}

/// What the browser learns about the signed-in operator. The bearer token
/// stays on the server.
#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    #[serde(rename = "UserId")]
    pub user_id: i64,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Email")]
    pub email: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Opens a session for a verified identity and builds the cookie-carrying reply.
async fn open_session(state: &AppState, identity: Identity) -> Response {
    let response = AuthResponse {
        user_id: identity.user_id,
        username: identity.name.clone(),
        email: identity.email.clone(),
    };
    let session_id = state.sessions.create(identity).await;
    info!("Opened session {}", session_id);
    let cookie = session_cookie(session_id, state.sessions.cookie_max_age());
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiEnvelope::success(response)),
    )
        .into_response()
}

/// POST /auth/login - First login step: forward credentials upstream
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 502, description = "Upstream unreachable")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, Response> {
    let identity = state
        .auth
        .sign_in(&req.email, &req.password)
        .await
        .map_err(|e| port_error_response(&e))?;
    Ok(open_session(&state, identity).await)
}

/// POST /auth/verify-otp - Second login step: verify the one-time code
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code accepted, session cookie set", body = AuthResponse),
        (status = 401, description = "Code rejected")
    )
)]
pub async fn verify_otp_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OtpRequest>,
) -> Result<Response, Response> {
    let identity = state
        .auth
        .verify_otp(&req.email, &req.otp)
        .await
        .map_err(|e| port_error_response(&e))?;
    Ok(open_session(&state, identity).await)
}

/// POST /auth/logout - Logout and invalidate the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> impl IntoResponse {
    state.sessions.remove(current.session_id).await;
    info!("Closed session {}", current.session_id);
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(ApiEnvelope::success_message("Signed out")),
    )
}

/// POST /auth/change-password - Change the signed-in operator's password
///
/// The user id is taken from the session identity, never from the request,
/// so an operator can only ever change their own password.
#[utoipa::path(
    post,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Session expired"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Response, Response> {
    let change = PasswordChange::from(req);
    if let Err(reason) = change.validate() {
        return Err(failure_response(StatusCode::UNPROCESSABLE_ENTITY, reason));
    }
    let message = match state
        .auth
        .change_password(&current.identity.token, current.identity.user_id, &change)
        .await
    {
        Ok(message) => message,
        Err(e) => return Err(authorized_failure(&state.sessions, current.session_id, e).await),
    };
    Ok(Json(ApiEnvelope::success_message(message)).into_response())
}

/// POST /auth/forgot-password - Request a password-reset mail
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset mail requested")
    )
)]
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Response, Response> {
    let message = state
        .auth
        .send_password_reset(&req.email)
        .await
        .map_err(|e| port_error_response(&e))?;
    Ok(Json(ApiEnvelope::success_message(message)).into_response())
}

/// POST /auth/verify-reset-token - Check a reset token before showing the form
#[utoipa::path(
    post,
    path = "/auth/verify-reset-token",
    request_body = VerifyResetTokenRequest,
    responses(
        (status = 200, description = "Token is valid, or invalid with a failure envelope")
    )
)]
pub async fn verify_reset_token_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyResetTokenRequest>,
) -> Result<Response, Response> {
    state
        .auth
        .verify_reset_token(&req.token)
        .await
        .map_err(|e| port_error_response(&e))?;
    Ok(Json(ApiEnvelope::success_message("Token verified")).into_response())
}

/// POST /auth/reset-password - Complete a password reset
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Response, Response> {
    if req.new_password.len() < 8 {
        return Err(failure_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "New password must be at least 8 characters long",
        ));
    }
    if req.new_password != req.confirm_password {
        return Err(failure_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Passwords must match",
        ));
    }
    let message = state
        .auth
        .reset_password(&req.token, &req.new_password, &req.confirm_password)
        .await
        .map_err(|e| port_error_response(&e))?;
    Ok(Json(ApiEnvelope::success_message(message)).into_response())
}

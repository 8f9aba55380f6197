//! services/panel/src/web/envelope.rs
//!
//! The panel answers the browser with the same reply convention the upstream
//! uses: every body carries a `ResponseStatus` and a human-readable `Message`.
//! The front end keys off `ResponseStatus`; the HTTP status only matters for
//! the 401 that ends a session.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use lead_review_core::ports::PortError;

#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    #[serde(rename = "ResponseStatus")]
    pub response_status: &'static str,
    #[serde(rename = "Message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "ResponseData", skip_serializing_if = "Option::is_none")]
    pub response_data: Option<T>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            response_status: "success",
            message: None,
            response_data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            response_status: "success",
            message: Some(message.into()),
            response_data: Some(data),
        }
    }
}

impl ApiEnvelope<()> {
    pub fn success_message(message: impl Into<String>) -> Self {
        Self {
            response_status: "success",
            message: Some(message.into()),
            response_data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            response_status: "failure",
            message: Some(message.into()),
            response_data: None,
        }
    }
}

/// Builds a failure reply with the given transport status.
pub fn failure_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiEnvelope::failure(message))).into_response()
}

/// Maps a port error onto the browser-facing reply. `Failure` keeps a 2xx
/// transport status, exactly like the upstream envelope convention; the
/// taxonomy variants that carry workflow meaning get their own statuses.
/// Authorized handlers route `Unauthorized` through session teardown
/// instead of this fallback.
pub fn port_error_response(err: &PortError) -> Response {
    match err {
        PortError::Unauthorized => {
            failure_response(StatusCode::UNAUTHORIZED, "Unauthorized. Token missing or expired")
        }
        PortError::NotFound(message) => failure_response(StatusCode::NOT_FOUND, message.clone()),
        PortError::InvalidState(message) => {
            failure_response(StatusCode::CONFLICT, message.clone())
        }
        PortError::Failure(message) => failure_response(StatusCode::OK, message.clone()),
        PortError::Transport(_) => failure_response(
            StatusCode::BAD_GATEWAY,
            "Something went wrong. Please try again.",
        ),
    }
}

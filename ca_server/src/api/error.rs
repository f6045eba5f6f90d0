//! Mapping from [`AuthError`] to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use campus_auth::AuthError;
use serde::Serialize;

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Handler error. Renders the status and client-safe message of the wrapped
/// [`AuthError`]; internal details only reach the log.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(kind = self.0.kind(), "Request rejected");
        }

        let body = ErrorResponse {
            success: false,
            error: self.0.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

//! Service-specific error types
//!
//! Every handler failure becomes a JSON body of the shape
//! `{"message": "...", "hint": "..."}` that the session client surfaces
//! verbatim when a refresh is rejected.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

const SIGN_IN_HINT: &str = "Sign in again to obtain a new session";

/// Per-request failures of the session endpoints.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Refresh called without the session cookie.
    #[error("No token found")]
    MissingToken,

    /// Session cookie or callback token failed verification.
    #[error("Invalid or expired session")]
    InvalidSession,

    /// Bearer access token missing or rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// The response itself could not be produced (signing, header encoding).
    #[error("{message}")]
    Internal { message: &'static str, detail: String },
}

impl SessionError {
    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::MissingToken
            | SessionError::InvalidSession
            | SessionError::Unauthorized => StatusCode::UNAUTHORIZED,
            SessionError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn hint(&self) -> Option<&'static str> {
        match self {
            SessionError::MissingToken | SessionError::InvalidSession => Some(SIGN_IN_HINT),
            _ => None,
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        if let SessionError::Internal { message, detail } = &self {
            tracing::error!(error = %detail, "{message}");
        }

        let mut body = serde_json::json!({ "message": self.to_string() });
        if let Some(hint) = self.hint() {
            body["hint"] = serde_json::Value::from(hint);
        }
        (
            self.status(),
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

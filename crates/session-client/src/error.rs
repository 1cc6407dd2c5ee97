//! Error types for session client operations

/// Errors surfaced to callers of the session client.
///
/// `Clone` because a single refresh outcome is handed to every caller that
/// joined the in-flight refresh.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Transport failure before any response arrived (DNS, connect, timeout).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The session could not be refreshed. The credential store has been
    /// cleared and the user sent back to the login page.
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    /// Non-2xx response from a convenience helper.
    #[error("request failed with status {status}: {status_text}")]
    Status { status: u16, status_text: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error ended the session (store cleared, navigation issued).
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::RefreshFailed(_))
    }

    /// `Status` error for a non-2xx response.
    ///
    /// Keeps the reason phrase the server actually sent. hyper only records
    /// one when it differs from the canonical phrase, so fall back to that.
    pub(crate) fn from_status(response: &reqwest::Response) -> Self {
        let status = response.status();
        let status_text = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
            .or_else(|| status.canonical_reason())
            .unwrap_or("Unknown")
            .to_string();
        Error::Status {
            status: status.as_u16(),
            status_text,
        }
    }
}

/// Result alias for session client operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Session endpoint exchanges
//!
//! Two calls against the gateway, both relying on the cookie jar of the
//! shared `reqwest::Client` to carry the httpOnly session cookie:
//! 1. Refresh: trade the session cookie for a fresh access token
//! 2. Logout: ask the server to expire the session cookie

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::credentials::AccessToken;
use crate::error::{Error, Result};

/// Body of a successful refresh response.
///
/// The field is optional so that a 2xx without a token is reported as a
/// refresh failure rather than a decode error.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
}

/// Error payload returned by the gateway on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
    #[serde(default)]
    hint: Option<String>,
}

/// POST the refresh endpoint and extract the new access token.
///
/// Every failure mode maps to `Error::RefreshFailed`: transport errors,
/// timeouts, non-2xx statuses, unreadable bodies and missing tokens.
pub async fn request_access_token(
    client: &reqwest::Client,
    url: Url,
    timeout: Duration,
) -> Result<AccessToken> {
    let response = client
        .post(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::RefreshFailed(format!(
                    "session endpoint did not respond within {}s",
                    timeout.as_secs()
                ))
            } else {
                Error::RefreshFailed(format!("refresh request failed: {e}"))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ErrorPayload>(&body) {
            Ok(ErrorPayload {
                message,
                hint: Some(hint),
            }) => format!("{message} ({hint})"),
            Ok(ErrorPayload { message, .. }) => message,
            Err(_) if body.is_empty() => String::from("<no body>"),
            Err(_) => body,
        };
        return Err(Error::RefreshFailed(format!(
            "session endpoint returned {status}: {detail}"
        )));
    }

    let payload = response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| Error::RefreshFailed(format!("invalid refresh response: {e}")))?;

    match payload.access_token {
        Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
        _ => Err(Error::RefreshFailed(
            "refresh response did not contain an access token".into(),
        )),
    }
}

/// POST the logout endpoint. The outcome is advisory only.
pub async fn request_logout(client: &reqwest::Client, url: Url, timeout: Duration) -> Result<()> {
    let response = client
        .post(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::Http(format!("logout request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::from_status(&response));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tokio::net::TcpListener;

    async fn serve(app: axum::Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn refresh_response_reads_camel_case_field() {
        let parsed: RefreshResponse = serde_json::from_str(r#"{"accessToken":"T2"}"#).unwrap();
        assert_eq!(parsed.access_token.as_deref(), Some("T2"));

        let missing: RefreshResponse = serde_json::from_str(r#"{"token":"T2"}"#).unwrap();
        assert!(missing.access_token.is_none());
    }

    #[tokio::test]
    async fn returns_token_on_success() {
        let base = serve(axum::Router::new().route(
            "/api/auth/refresh",
            post(|| async { axum::Json(serde_json::json!({ "accessToken": "T2" })) }),
        ))
        .await;

        let url = Url::parse(&format!("{base}/api/auth/refresh")).unwrap();
        let token = request_access_token(&reqwest::Client::new(), url, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(token.expose(), "T2");
    }

    #[tokio::test]
    async fn missing_cookie_response_is_refresh_failure() {
        let base = serve(axum::Router::new().route(
            "/api/auth/refresh",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(serde_json::json!({
                        "message": "No token found",
                        "hint": "Sign in again to obtain a new session"
                    })),
                )
            }),
        ))
        .await;

        let url = Url::parse(&format!("{base}/api/auth/refresh")).unwrap();
        let err = request_access_token(&reqwest::Client::new(), url, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_session_expired());
        let msg = err.to_string();
        assert!(msg.contains("401"), "got: {msg}");
        assert!(msg.contains("No token found"), "got: {msg}");
    }

    #[tokio::test]
    async fn success_without_token_is_refresh_failure() {
        let base = serve(axum::Router::new().route(
            "/api/auth/refresh",
            post(|| async { axum::Json(serde_json::json!({ "ok": true })) }),
        ))
        .await;

        let url = Url::parse(&format!("{base}/api/auth/refresh")).unwrap();
        let err = request_access_token(&reqwest::Client::new(), url, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("did not contain an access token"),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn hanging_endpoint_times_out() {
        let base = serve(axum::Router::new().route(
            "/api/auth/refresh",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                axum::Json(serde_json::json!({ "accessToken": "late" }))
            }),
        ))
        .await;

        let url = Url::parse(&format!("{base}/api/auth/refresh")).unwrap();
        let err = request_access_token(&reqwest::Client::new(), url, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_session_expired(), "got: {err}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_refresh_failure() {
        let url = Url::parse("http://127.0.0.1:1/api/auth/refresh").unwrap();
        let err = request_access_token(&reqwest::Client::new(), url, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.is_session_expired());
    }

    #[tokio::test]
    async fn logout_reports_server_error_status() {
        let base = serve(axum::Router::new().route(
            "/api/auth/logout",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;

        let url = Url::parse(&format!("{base}/api/auth/logout")).unwrap();
        let err = request_logout(&reqwest::Client::new(), url, Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            Error::Status { status, .. } => assert_eq!(status, 500),
            other => panic!("expected status error, got {other:?}"),
        }
    }
}

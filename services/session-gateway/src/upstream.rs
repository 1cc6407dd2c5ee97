//! Upstream logout notification
//!
//! Tells the server-side session service that a session ended, forwarding the
//! browser's cookies so it can identify which one. Best effort: failures are
//! reported to the caller for logging and metrics, never to the browser.

use axum::http::HeaderValue;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream logout timed out after {0}s")]
    Timeout(u64),
    #[error("upstream logout request failed: {0}")]
    Request(String),
    #[error("upstream logout returned {0}")]
    Status(u16),
}

#[derive(Clone, Debug)]
pub struct UpstreamLogout {
    client: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
}

impl UpstreamLogout {
    pub fn new(client: reqwest::Client, url: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }

    /// POST the upstream logout endpoint with the inbound Cookie header.
    ///
    /// Returns `Ok(false)` when no upstream is configured.
    #[instrument(skip_all)]
    pub async fn notify(&self, cookie: Option<&HeaderValue>) -> Result<bool, UpstreamError> {
        let Some(url) = &self.url else {
            return Ok(false);
        };

        let mut request = self.client.post(url).timeout(self.timeout);
        if let Some(cookie) = cookie {
            request = request.header(reqwest::header::COOKIE, cookie.clone());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(self.timeout.as_secs())
            } else {
                UpstreamError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }
        debug!(status = status.as_u16(), "upstream logout acknowledged");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    async fn serve(app: axum::Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn unconfigured_upstream_is_skipped() {
        let upstream = UpstreamLogout::new(reqwest::Client::new(), None, Duration::from_secs(1));
        assert!(!upstream.notify(None).await.unwrap());
    }

    #[tokio::test]
    async fn forwards_cookie_header() {
        let seen = Arc::new(Mutex::new(None::<String>));
        let recorder = seen.clone();
        let base = serve(axum::Router::new().route(
            "/logout",
            post(move |headers: HeaderMap| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock().unwrap() = headers
                        .get("cookie")
                        .map(|v| v.to_str().unwrap().to_string());
                    StatusCode::NO_CONTENT
                }
            }),
        ))
        .await;

        let upstream = UpstreamLogout::new(
            reqwest::Client::new(),
            Some(format!("{base}/logout")),
            Duration::from_secs(5),
        );
        let cookie = HeaderValue::from_static("refresh_token=abc; theme=dark");
        assert!(upstream.notify(Some(&cookie)).await.unwrap());
        assert_eq!(
            seen.lock().unwrap().as_deref(),
            Some("refresh_token=abc; theme=dark")
        );
    }

    #[tokio::test]
    async fn error_status_reported() {
        let base = serve(axum::Router::new().route(
            "/logout",
            post(|| async { StatusCode::BAD_GATEWAY }),
        ))
        .await;

        let upstream = UpstreamLogout::new(
            reqwest::Client::new(),
            Some(format!("{base}/logout")),
            Duration::from_secs(5),
        );
        assert!(matches!(
            upstream.notify(None).await,
            Err(UpstreamError::Status(502))
        ));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let base = serve(axum::Router::new().route(
            "/logout",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        ))
        .await;

        let upstream = UpstreamLogout::new(
            reqwest::Client::new(),
            Some(format!("{base}/logout")),
            Duration::from_millis(100),
        );
        assert!(matches!(
            upstream.notify(None).await,
            Err(UpstreamError::Timeout(_))
        ));
    }
}

//! Single-flight session refresh
//!
//! At most one refresh exchange runs per session context. The first caller
//! spawns the exchange as its own task and publishes a shared future; every
//! caller that arrives while it is pending awaits that same future, so all of
//! them settle exactly once with the same token or the same failure.
//!
//! The exchange runs on a spawned task so a caller that gives up (dropped
//! future, aborted task) never cancels it: the store is still updated for
//! everyone else.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::credentials::{AccessToken, CredentialStore};
use crate::error::{Error, Result};
use crate::navigator::Navigator;
use crate::token;

type SharedRefresh = Shared<BoxFuture<'static, Result<AccessToken>>>;

struct InFlight {
    id: u64,
    result: SharedRefresh,
}

/// Coordinates refreshes of the access token against the session endpoint.
///
/// On success the new token is written to the credential store before any
/// waiter is released. On failure the store is cleared and the navigator is
/// sent to the login page, then every waiter receives the error.
pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: Url,
    login_url: String,
    timeout: Duration,
    store: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    in_flight: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
}

impl RefreshCoordinator {
    /// `http` must be the same cookie-carrying client the request wrapper
    /// uses, otherwise the session cookie never reaches the refresh endpoint.
    pub fn new(
        http: reqwest::Client,
        refresh_url: Url,
        login_url: String,
        timeout: Duration,
        store: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            http,
            refresh_url,
            login_url,
            timeout,
            store,
            navigator,
            in_flight: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Obtain a fresh access token, joining any refresh already in flight.
    pub async fn refresh(self: &Arc<Self>) -> Result<AccessToken> {
        let pending = self.join_or_start();
        pending.await
    }

    /// Whether a refresh exchange is currently outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.lock_slot().is_some()
    }

    fn join_or_start(self: &Arc<Self>) -> SharedRefresh {
        let mut slot = self.lock_slot();
        if let Some(in_flight) = slot.as_ref() {
            debug!(refresh_id = in_flight.id, "joining in-flight refresh");
            return in_flight.result.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // The slot lock is held until the shared future is published, so the
        // task's reset guard cannot clear the slot before it is filled.
        let task = tokio::spawn(Arc::clone(self).run(id));
        let result = async move {
            task.await.unwrap_or_else(|e| {
                Err(Error::RefreshFailed(format!("refresh task aborted: {e}")))
            })
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            id,
            result: result.clone(),
        });
        result
    }

    async fn run(self: Arc<Self>, id: u64) -> Result<AccessToken> {
        let _reset = ResetInFlight {
            coordinator: &self,
            id,
        };

        info!(refresh_id = id, "refreshing session");
        match token::request_access_token(&self.http, self.refresh_url.clone(), self.timeout).await
        {
            Ok(token) => {
                self.store.set(token.clone()).await;
                metrics::counter!("session_refresh_total", "outcome" => "success").increment(1);
                info!(refresh_id = id, "session refreshed");
                Ok(token)
            }
            Err(e) => {
                warn!(refresh_id = id, error = %e, "session refresh failed, ending session");
                self.store.clear().await;
                self.navigator.navigate(&self.login_url);
                metrics::counter!("session_refresh_total", "outcome" => "failure").increment(1);
                Err(e)
            }
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Frees the in-flight slot when a refresh task finishes, however it finishes.
struct ResetInFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    id: u64,
}

impl Drop for ResetInFlight<'_> {
    fn drop(&mut self) {
        let mut slot = self.coordinator.lock_slot();
        if slot.as_ref().is_some_and(|f| f.id == self.id) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::RecordingNavigator;
    use axum::http::StatusCode;
    use axum::routing::post;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;

    const LOGIN_URL: &str = "https://auth.fleet.example.com/login";

    /// Start a refresh endpoint that counts hits and answers after `delay`.
    async fn refresh_server(
        status: StatusCode,
        body: serde_json::Value,
        delay: Duration,
    ) -> (Url, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/api/auth/refresh",
            post(move || {
                let counter = counter.clone();
                let body = body.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    (status, axum::Json(body))
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = Url::parse(&format!("http://{addr}/api/auth/refresh")).unwrap();
        (url, hits)
    }

    fn coordinator(
        url: Url,
        timeout: Duration,
    ) -> (
        Arc<RefreshCoordinator>,
        Arc<CredentialStore>,
        Arc<RecordingNavigator>,
    ) {
        let store = Arc::new(CredentialStore::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let coordinator = Arc::new(RefreshCoordinator::new(
            reqwest::Client::new(),
            url,
            LOGIN_URL.to_string(),
            timeout,
            store.clone(),
            navigator.clone(),
        ));
        (coordinator, store, navigator)
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let (url, hits) = refresh_server(
            StatusCode::OK,
            serde_json::json!({ "accessToken": "T2" }),
            Duration::from_millis(100),
        )
        .await;
        let (coordinator, store, navigator) = coordinator(url, Duration::from_secs(5));

        let mut handles = vec![];
        for _ in 0..10 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move { coordinator.refresh().await }));
        }
        for h in handles {
            let token = h.await.unwrap().unwrap();
            assert_eq!(token.expose(), "T2");
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1, "exactly one refresh POST");
        assert_eq!(store.get().await.unwrap().expose(), "T2");
        assert!(navigator.visited().is_empty());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn failure_clears_store_navigates_and_fails_every_waiter() {
        let (url, hits) = refresh_server(
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "message": "No token found", "hint": "sign in" }),
            Duration::from_millis(100),
        )
        .await;
        let (coordinator, store, navigator) = coordinator(url, Duration::from_secs(5));
        store.set(AccessToken::new("stale")).await;

        let mut handles = vec![];
        for _ in 0..5 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move { coordinator.refresh().await }));
        }
        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert!(err.is_session_expired(), "got: {err}");
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(store.get().await.is_none(), "store must be cleared");
        assert_eq!(navigator.visited(), vec![LOGIN_URL.to_string()]);
    }

    #[tokio::test]
    async fn slot_is_released_after_failure() {
        let (url, hits) = refresh_server(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "message": "boom" }),
            Duration::ZERO,
        )
        .await;
        let (coordinator, _store, _navigator) = coordinator(url, Duration::from_secs(5));

        assert!(coordinator.refresh().await.is_err());
        assert!(!coordinator.is_refreshing());
        assert!(coordinator.refresh().await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 2, "second attempt must hit the network");
    }

    #[tokio::test]
    async fn hanging_endpoint_does_not_lock_out_refresh() {
        let (url, _hits) = refresh_server(
            StatusCode::OK,
            serde_json::json!({ "accessToken": "too-late" }),
            Duration::from_secs(5),
        )
        .await;
        let (coordinator, store, navigator) = coordinator(url, Duration::from_millis(100));

        let err = coordinator.refresh().await.unwrap_err();
        assert!(err.is_session_expired());
        assert!(!coordinator.is_refreshing());
        assert!(store.get().await.is_none());
        assert_eq!(navigator.last().as_deref(), Some(LOGIN_URL));
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_cancel_exchange() {
        let (url, hits) = refresh_server(
            StatusCode::OK,
            serde_json::json!({ "accessToken": "T3" }),
            Duration::from_millis(100),
        )
        .await;
        let (coordinator, store, _navigator) = coordinator(url, Duration::from_secs(5));

        let caller = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        caller.abort();

        for _ in 0..50 {
            if store.get().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(store.get().await.unwrap().expose(), "T3");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn sequential_refreshes_each_hit_the_network() {
        let (url, hits) = refresh_server(
            StatusCode::OK,
            serde_json::json!({ "accessToken": "T2" }),
            Duration::ZERO,
        )
        .await;
        let (coordinator, _store, _navigator) = coordinator(url, Duration::from_secs(5));

        coordinator.refresh().await.unwrap();
        coordinator.refresh().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}

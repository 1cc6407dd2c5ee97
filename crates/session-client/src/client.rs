//! Authenticated request wrapper
//!
//! `SessionClient` is the session context object: it owns the credential
//! store, the refresh coordinator and the cookie-carrying HTTP client, and is
//! the only path application code uses for calls that need the access token.
//!
//! Per call: attach the current token, send, and on a 401 run exactly one
//! refresh-and-retry cycle. Any other status is returned untouched. The retry
//! response is returned whatever its status; there is no second retry.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::coordinator::RefreshCoordinator;
use crate::credentials::{AccessToken, CredentialStore};
use crate::error::{Error, Result};
use crate::navigator::Navigator;
use crate::token;

/// A request that can be sent more than once.
///
/// The body is held as `Bytes` so the single retry after a refresh resends
/// exactly what the first attempt sent.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set the content type.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value)
            .map_err(|e| Error::InvalidRequest(format!("encoding JSON body: {e}")))?;
        Ok(self
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(encoded))
    }
}

/// Session context for one signed-in user.
///
/// Construct once at startup and share (it is cheap to clone). Dropping the
/// last clone drops the token; `dispose` clears it eagerly.
#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    navigator: Arc<dyn Navigator>,
}

impl SessionClient {
    /// Build a client with its own cookie jar.
    pub fn new(config: ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {e}")))?;
        Self::with_http_client(config, http, navigator)
    }

    /// Build a client around an existing HTTP client.
    ///
    /// The client must keep cookies (`cookie_store(true)` or a
    /// `cookie_provider`), or the session cookie will never be sent.
    pub fn with_http_client(
        config: ClientConfig,
        http: reqwest::Client,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(CredentialStore::new());
        let coordinator = Arc::new(RefreshCoordinator::new(
            http.clone(),
            config.endpoint(&config.refresh_path)?,
            config.login_url.clone(),
            config.refresh_timeout(),
            store.clone(),
            navigator.clone(),
        ));

        info!(base_url = %config.base_url, "session client initialized");
        Ok(Self {
            http,
            config: Arc::new(config),
            store,
            coordinator,
            navigator,
        })
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Obtain an access token from the session cookie before the first call.
    ///
    /// Optional: the first 401 triggers the same refresh lazily.
    pub async fn bootstrap(&self) -> Result<AccessToken> {
        self.coordinator.refresh().await
    }

    /// Send a request with the current token and one refresh-and-retry on 401.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response> {
        let url = self.config.endpoint(&request.path)?;

        let token = self.store.get().await;
        let response = self.dispatch(request, &url, token.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("unauthorized, refreshing session before retry");
        let token = self.coordinator.refresh().await?;

        let retried = self.dispatch(request, &url, Some(&token)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("request still unauthorized after refresh");
        }
        Ok(retried)
    }

    /// GET and decode a JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::post(path).json(body)?).await
    }

    /// PUT a JSON body and decode the JSON response.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::put(path).json(body)?).await
    }

    /// DELETE and decode the JSON response (an empty body decodes as `null`).
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(ApiRequest::delete(path)).await
    }

    /// End the session: tell the server, clear the token, go to the login page.
    ///
    /// Navigation happens whatever the logout call returns.
    pub async fn logout_user(&self) {
        match self.config.endpoint(&self.config.logout_path) {
            Ok(url) => {
                if let Err(e) = token::request_logout(&self.http, url, self.config.request_timeout()).await {
                    warn!(error = %e, "logout request failed, ending local session anyway");
                }
            }
            Err(e) => warn!(error = %e, "logout endpoint unresolvable"),
        }

        self.store.clear().await;
        self.navigator.navigate(&self.config.login_url);
        info!("user logged out");
    }

    /// Clear the in-memory token at teardown without contacting the server.
    pub async fn dispose(&self) {
        self.store.clear().await;
    }

    async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let request = request.header(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        let response = self.send(&request).await?;

        if !response.status().is_success() {
            return Err(Error::from_status(&response));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("reading response body: {e}")))?;
        decode_json(&body)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        url: &Url,
        token: Option<&AccessToken>,
    ) -> Result<reqwest::Response> {
        let mut headers = request.headers.clone();
        headers.remove(AUTHORIZATION);
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
                .map_err(|e| Error::InvalidRequest(format!("invalid token value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers)
            .timeout(self.config.request_timeout());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        builder
            .send()
            .await
            .map_err(|e| Error::Http(format!("{} {url}: {e}", request.method)))
    }
}

/// Decode a JSON body, treating an empty body (e.g. 204) as `null`.
fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
}

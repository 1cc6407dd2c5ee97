//! Session endpoints
//!
//! - `POST /api/auth/refresh`: trade the session cookie for an access token
//! - `POST /api/auth/logout`: expire the cookie, notify upstream
//! - `GET /api/auth/callback`: accept a refresh token from the login flow
//! - `GET /api/auth/me`: verify a bearer access token

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cookie::CookieSettings;
use crate::error::SessionError;
use crate::jwt::{TokenSigner, TokenType};
use crate::metrics;
use crate::upstream::UpstreamLogout;

/// State shared by the session handlers.
#[derive(Clone)]
pub struct SessionState {
    pub signer: Arc<TokenSigner>,
    pub cookies: Arc<CookieSettings>,
    pub app_url: Arc<str>,
    pub upstream: UpstreamLogout,
}

pub fn router() -> Router<SessionState> {
    Router::new()
        .route("/api/auth/refresh", post(refresh_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/callback", get(callback_handler))
        .route("/api/auth/me", get(me_handler))
}

async fn refresh_handler(
    State(state): State<SessionState>,
    headers: HeaderMap,
) -> Result<Response, SessionError> {
    let Some(cookie) = state.cookies.read(&headers) else {
        debug!("refresh without session cookie");
        metrics::record_refresh("missing_cookie");
        return Err(SessionError::MissingToken);
    };

    let refresh = state
        .signer
        .verify(cookie, TokenType::Refresh)
        .map_err(|e| {
            info!(error = %e, "rejected session cookie");
            metrics::record_refresh("invalid");
            SessionError::InvalidSession
        })?;

    let access = state
        .signer
        .mint_access(&refresh)
        .map_err(|e| SessionError::Internal {
            message: "Refresh failed",
            detail: e.to_string(),
        })?;

    metrics::record_refresh("success");
    info!(
        sub = %refresh.sub,
        ttl_secs = state.signer.access_ttl_secs(),
        "access token issued"
    );
    Ok((
        [(CACHE_CONTROL, "no-store")],
        Json(serde_json::json!({ "accessToken": access })),
    )
        .into_response())
}

async fn logout_handler(
    State(state): State<SessionState>,
    headers: HeaderMap,
) -> Result<Response, SessionError> {
    let upstream = match state.upstream.notify(headers.get(COOKIE)).await {
        Ok(true) => "ok",
        Ok(false) => "skipped",
        Err(e) => {
            warn!(error = %e, "upstream logout failed, expiring cookie anyway");
            "failed"
        }
    };
    metrics::record_logout(upstream);

    let expired = HeaderValue::from_str(&state.cookies.expired_cookie()).map_err(|e| {
        SessionError::Internal {
            message: "Logout failed",
            detail: e.to_string(),
        }
    })?;

    info!(upstream, "session logged out");
    Ok((
        StatusCode::OK,
        [(SET_COOKIE, expired)],
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    token: Option<String>,
}

async fn callback_handler(
    State(state): State<SessionState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, SessionError> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or(SessionError::MissingToken)?;

    let claims = state
        .signer
        .verify(&token, TokenType::Refresh)
        .map_err(|e| {
            info!(error = %e, "rejected login callback token");
            SessionError::InvalidSession
        })?;

    let cookie = HeaderValue::from_str(&state.cookies.session_cookie(&token)).map_err(|e| {
        SessionError::Internal {
            message: "Sign-in failed",
            detail: e.to_string(),
        }
    })?;
    let location = HeaderValue::from_str(&state.app_url).map_err(|e| SessionError::Internal {
        message: "Sign-in failed",
        detail: e.to_string(),
    })?;

    info!(sub = %claims.sub, "session started");
    Ok((
        StatusCode::SEE_OTHER,
        [(SET_COOKIE, cookie), (LOCATION, location)],
    )
        .into_response())
}

async fn me_handler(
    State(state): State<SessionState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, SessionError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(SessionError::Unauthorized)?;

    let claims = state
        .signer
        .verify(token, TokenType::Access)
        .map_err(|e| {
            debug!(error = %e, "rejected access token");
            SessionError::Unauthorized
        })?;

    Ok(Json(serde_json::json!({
        "sub": claims.sub,
        "role": claims.role,
        "exp": claims.exp,
    })))
}

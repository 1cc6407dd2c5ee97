//! Fleet Session Gateway
//!
//! Single-binary Rust service that:
//! 1. Accepts refresh tokens from the login flow and stores them in an
//!    httpOnly cookie
//! 2. Trades that cookie for short-lived access tokens on demand
//! 3. Expires the cookie on logout and notifies the upstream session service
//! 4. Exposes health and Prometheus metrics

mod config;
mod cookie;
mod error;
mod jwt;
mod metrics;
mod session;
mod upstream;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::cookie::CookieSettings;
use crate::jwt::TokenSigner;
use crate::session::SessionState;
use crate::upstream::UpstreamLogout;

/// How long in-flight requests may take to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters surfaced on `/health`.
#[derive(Debug, Clone)]
struct ServiceStats {
    requests_total: Arc<AtomicU64>,
    in_flight: Arc<AtomicU64>,
    started_at: Instant,
}

impl ServiceStats {
    fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    session: SessionState,
    stats: ServiceStats,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// The concurrency limit caps simultaneous requests at `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let stats = state.stats.clone();
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone())
        .merge(session::router().with_state::<()>(state.session))
        .layer(axum::middleware::from_fn_with_state(stats, track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

fn session_state(config: &Config, http: reqwest::Client) -> Result<SessionState> {
    let secret = config
        .session
        .secret
        .as_ref()
        .context("signing secret not loaded")?;

    Ok(SessionState {
        signer: Arc::new(TokenSigner::new(
            secret.expose().as_bytes(),
            &config.session.issuer,
            config.session.access_token_ttl_secs,
        )),
        cookies: Arc::new(CookieSettings::from_config(&config.session)),
        app_url: Arc::from(config.session.app_url.as_str()),
        upstream: UpstreamLogout::new(
            http,
            config.upstream.logout_url.clone(),
            Duration::from_secs(config.upstream.timeout_secs),
        ),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting fleet-session-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        app_url = %config.session.app_url,
        cookie_name = %config.session.cookie_name,
        secure_cookie = config.session.secure,
        upstream_logout = config.upstream.logout_url.is_some(),
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let stats = ServiceStats::new();
    let app_state = AppState {
        session: session_state(&config, http)?,
        stats: stats.clone(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race it against the timer.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            let remaining = stats.in_flight.load(Ordering::Relaxed);
            warn!(
                remaining,
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Count every request and record its status and latency.
async fn track_requests(
    State(stats): State<ServiceStats>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let started = Instant::now();
    stats.in_flight.fetch_add(1, Ordering::Relaxed);

    let response = next.run(request).await;

    stats.in_flight.fetch_sub(1, Ordering::Relaxed);
    stats.requests_total.fetch_add(1, Ordering::Relaxed);
    metrics::record_request(
        response.status().as_u16(),
        &method,
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Health endpoint: status, uptime, requests served.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.stats.started_at.elapsed().as_secs(),
        "requests_served": state.stats.requests_total.load(Ordering::Relaxed),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

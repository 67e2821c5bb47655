//! HTTP boundary for tasso.
//!
//! Endpoints
//! - `GET /latest-cases-per-test`: latest ratio per state.
//! - `GET /historical-cases-per-test?state=<name>`: ratio per `MM-dd-yyyy` date.
//! - `GET /health`: preload status.
//! - `OPTIONS *`: CORS preflight echo.
//!
//! Every response carries `Access-Control-Allow-Origin` when an origin is configured.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::get;
use tasso::{PreloadCache, QueryService};
use tasso_jhu::JhuSource;
use tokio::net::TcpListener;

pub mod config;
mod error;
pub mod handlers;

pub use config::ServerConfig;
pub use error::{ApiError, ErrorBody, ServerError};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Query side of the preload cache.
    pub query: QueryService,
    /// Value stamped as `Access-Control-Allow-Origin`, if any.
    pub allowed_origin: Option<HeaderValue>,
}

impl AppState {
    /// Build state from a query service and an optional allowed origin.
    ///
    /// # Errors
    /// Returns `ServerError::Config` if the origin is not a valid header value.
    pub fn new(query: QueryService, allowed_origin: Option<&str>) -> Result<Self, ServerError> {
        let allowed_origin = handlers::origin_header(allowed_origin).map_err(|o| {
            ServerError::Config(format!(
                "CASES_PER_TEST_FRONTEND_DOMAIN='{o}' is not a valid header value"
            ))
        })?;
        Ok(Self {
            query,
            allowed_origin,
        })
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/latest-cases-per-test",
            get(handlers::latest_cases_per_test).options(handlers::preflight),
        )
        .route(
            "/historical-cases-per-test",
            get(handlers::historical_cases_per_test).options(handlers::preflight),
        )
        .route("/health", get(handlers::health))
        .fallback(handlers::fallback)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::allow_origin,
        ))
        .with_state(state)
}

/// Serve `state` on an already-bound listener until the listener fails.
///
/// # Errors
/// Returns the I/O error that stopped the server.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Start the preload, bind `0.0.0.0:<port>`, and serve until the server
/// fails or the preload fails.
///
/// The listener is up while the preload runs, so the latest endpoint answers
/// right away.
///
/// # Errors
/// Returns `Preload` when the preload cannot complete, so the process can
/// exit non-zero, and `Io` or `Config` for startup failures.
pub async fn run(cfg: ServerConfig) -> Result<(), ServerError> {
    let source = JhuSource::with_base_url(&cfg.source_base_url)
        .map_err(|e| ServerError::Config(format!("TASSO_SOURCE_BASE_URL: {e}")))?;
    let source = Arc::new(source);
    let cache = PreloadCache::builder()
        .source(source)
        .config(cfg.tasso.clone())
        .spawn()?;
    let state = AppState::new(
        QueryService::new(Arc::clone(&cache)),
        cfg.allowed_origin.as_deref(),
    )?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, cfg.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, source = %cfg.source_base_url, "listening");

    // Completes only if the preload fails.
    let preload_failed = async {
        match cache.failure().await {
            Some(e) => e,
            None => {
                tracing::info!(status = ?cache.status(), "preload ready");
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        served = serve(listener, state) => served,
        e = preload_failed => {
            tracing::error!(error = %e, "preload failed; shutting down");
            Err(ServerError::Preload(e))
        }
    }
}

use axum::extract::DefaultBodyLimit;
use axum::{Extension, Router};
use http::header::{HeaderName, ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::Method;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::sensitive_headers::{
    SetSensitiveRequestHeadersLayer, SetSensitiveResponseHeadersLayer,
};
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

pub mod api;
mod config;
mod handlers;
mod health;

pub use config::{normalize_prefix, Config};

use crate::ServiceState;

const STATUS_PREFIX: &str = "/_status";

/// Maximum upload size in bytes (32 MiB)
pub const MAX_UPLOAD_SIZE_BYTES: usize = 32 * 1024 * 1024;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the full router: health under `/_status`, the API at the root, both
/// nested under the configured path prefix.
pub fn router(config: &Config, state: ServiceState) -> Router {
    let log_level = config.log_level;
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    // Cookies carry sessions, so only same-origin credentialed requests.
    let cors_layer = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::PUT, Method::POST, Method::DELETE])
        .allow_headers(vec![
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(api::AUTH_USER_HEADER),
            HeaderName::from_static(api::AUTH_TOKEN_HEADER),
        ])
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true);

    let routes = Router::new()
        .nest(STATUS_PREFIX, health::router(state.clone()))
        .merge(api::router(state.clone()));

    let routes = if config.path_prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&config.path_prefix, routes)
    };

    routes
        .fallback(handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(
            MAX_UPLOAD_SIZE_BYTES + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(Extension(config.clone()))
        .with_state(state)
        .layer(cors_layer)
        .layer(SetSensitiveResponseHeadersLayer::new([SET_COOKIE]))
        .layer(SetSensitiveRequestHeadersLayer::new([
            COOKIE,
            HeaderName::from_static(api::AUTH_TOKEN_HEADER),
        ]))
        .layer(trace_layer)
}

/// Run the HTTP server until the shutdown channel fires.
pub async fn run_api(
    config: Config,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listen_addr = config.listen_addr;
    let router = router(&config, state);

    tracing::info!(addr = ?listen_addr, prefix = %config.path_prefix, "API server listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}

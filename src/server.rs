use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::config::Config;
use crate::handlers::{health_check, list_files, progress_events, upload_files};
use crate::state::AppState;
use crate::utils::shutdown_signal;

/// routes only, without the transport-level layers
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload", post(upload_files))
        .route("/events", get(progress_events))
        .route("/files", get(list_files))
        .route("/health", get(health_check))
        // uploads are streamed, the size cap lives in RequestBodyLimitLayer
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// build the full router
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    tracing::debug!("Building router with max upload size: {} bytes", config.max_upload_size);

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::list(origins))
        .allow_headers(Any);

    let router = api_routes(state)
        .layer(RequestBodyLimitLayer::new(config.max_upload_size));

    // configure rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_second)
        .burst_size(config.rate_limit_burst)
        .finish();

    let router = match governor_conf {
        Some(conf) => router.layer(GovernorLayer {
            config: Arc::new(conf),
        }),
        None => {
            tracing::warn!("Rate limit disabled: per-second and burst must both be non-zero");
            router
        }
    };

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// bind and serve until a shutdown signal arrives
pub async fn start_server(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    tracing::info!("Starting server...");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!("Listener bound to {}", addr);

    tracing::info!("Server running and ready to accept connections");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true)
    .await
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("Driveway starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 UPLOAD API: http://{}:{}/upload", config.host, config.port);
    tracing::info!("🔔 PROGRESS EVENTS: http://{}:{}/events", config.host, config.port);
    tracing::info!("⏱️  Progress delay: {:?}", config.progress_delay);
    tracing::info!("📁 Storing files in: {:?}", config.files_dir.canonicalize().unwrap_or(config.files_dir.clone()));
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

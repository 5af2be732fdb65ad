//! DealFlow API Gateway
//!
//! HTTP surface over the document intelligence engine.
//! Handles:
//! - Document ingestion and deletion
//! - Company directory, similarity, scoring and ranking
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;
mod seed;
mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use dealflow_common::{config::AppConfig, metrics};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config);
    info!(
        service = %config.observability.service_name,
        "Starting DealFlow API Gateway v{}",
        dealflow_common::VERSION
    );

    // Initialize metrics
    let prometheus = install_metrics_recorder()?;
    metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        spawn_metrics_listener(prometheus.clone(), config.observability.metrics_port);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::build(config.clone(), Some(prometheus), shutdown_rx)?;
    info!(
        model = %state.index.model_id(),
        dimension = state.index.dimension(),
        "Engine ready"
    );

    if let Some(dir) = config.ingestion.seed_dir.as_deref() {
        if let Err(e) = seed::seed_from_dir(&state, Path::new(dir)).await {
            error!(error = %e, seed_dir = dir, "Failed to load seed data");
        }
    }

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("embedding_duration_seconds".to_string()),
            metrics::EMBEDDING_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("ingestion_duration_seconds".to_string()),
            metrics::EMBEDDING_BUCKETS,
        )?
        .set_buckets(metrics::LATENCY_BUCKETS)?
        .install_recorder()?;
    Ok(handle)
}

/// Serve `/metrics` on a dedicated port for scrapers
fn spawn_metrics_listener(handle: PrometheusHandle, port: u16) {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("Metrics listening on {}", addr);
                if let Err(e) = axum::serve(listener, app).await {
                    error!(error = %e, "Metrics listener failed");
                }
            }
            Err(e) => warn!(error = %e, port, "Could not bind metrics port"),
        }
    });
}

/// Create the main application router
pub fn create_router(state: AppState) -> dealflow_common::errors::Result<Router> {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        .route("/stats", get(handlers::health::stats))
        // Documents
        .route("/documents", post(handlers::documents::ingest_document))
        .route("/documents/batch", post(handlers::documents::ingest_batch))
        .route("/documents/{id}", delete(handlers::documents::delete_document))
        // Companies
        .route("/companies", get(handlers::companies::list_companies))
        .route(
            "/companies/{id}",
            get(handlers::companies::get_company).put(handlers::companies::upsert_company),
        )
        .route(
            "/companies/{id}/similar",
            get(handlers::companies::similar_companies),
        )
        // Retrieval and scoring
        .route("/search", post(handlers::search::search))
        .route("/score", post(handlers::scoring::score))
        .route("/rank", post(handlers::scoring::rank));

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        )?;
        api_routes = api_routes.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Ok(Router::new()
        // Health endpoints (never rate limited)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/v1", api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state))
}

/// Graceful shutdown signal handler
async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }

    // In-flight batches finish their current documents and schedule no more
    let _ = shutdown.send(true);
}

#[cfg(test)]
mod tests;

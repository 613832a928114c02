use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use xray_review::app_state::AppState;
use xray_review::config::AppConfig;
use xray_review::routes::{self, metrics::MetricsState};
use xray_review::services::storage::{MemoryStorage, R2Storage, StorageSink};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(
        results_per_image = config.results_per_image,
        carousel_size = config.carousel_size,
        "Initializing xray-review server"
    );

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("review_jobs_submitted_total", "Photos submitted for review");
    metrics::describe_counter!("review_jobs_confirmed_total", "Jobs confirmed and archived");
    metrics::describe_counter!("review_jobs_retried_total", "Jobs sent back to the workers");
    metrics::describe_counter!("review_jobs_cancelled_total", "Jobs cancelled by a reviewer");
    metrics::describe_counter!(
        "review_results_submitted_total",
        "Candidate results handed in by workers"
    );
    metrics::describe_counter!(
        "review_archive_failures_total",
        "Confirmed jobs whose archive write failed"
    );
    metrics::describe_gauge!("review_queue_depth", "Jobs still eligible for dispatch");
    metrics::describe_gauge!("review_awaiting_approval", "Jobs awaiting a review decision");
    metrics::describe_histogram!(
        "fracture_composite_seconds",
        "Time to composite a fracture overlay"
    );

    // Initialize archive storage
    let storage: Arc<dyn StorageSink> = match config.r2_settings() {
        Some(settings) => {
            tracing::info!("Connecting to R2 archive");
            Arc::new(
                R2Storage::connect(&settings)
                    .await
                    .expect("Failed to initialize R2 storage"),
            )
        }
        None => {
            tracing::warn!("R2 not configured, archiving confirmed jobs in memory");
            Arc::new(MemoryStorage::new())
        }
    };

    let bind_addr = config.bind_addr.clone();
    let upload_limit = config.upload_limit_bytes;

    // Create shared application state
    let state = AppState::new(config, storage);
    let metrics_state = MetricsState {
        handle: prometheus_handle,
        queue: Arc::clone(&state.queue),
    };

    // Build API routes
    let app = routes::api_router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(metrics_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit));

    tracing::info!("Starting xray-review on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::services::review_queue::ReviewQueue;

/// State of the scrape endpoint.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: Arc<PrometheusHandle>,
    pub queue: Arc<ReviewQueue>,
}

/// Prometheus metrics scrape endpoint.
/// Refreshes the queue gauges, then renders the text exposition format.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    metrics::gauge!("review_queue_depth").set(state.queue.queue_depth().await as f64);
    metrics::gauge!("review_awaiting_approval").set(state.queue.awaiting_count().await as f64);
    state.handle.render()
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub queue: QueueHealth,
    pub storage: ComponentHealth,
}

#[derive(Serialize)]
pub struct QueueHealth {
    pub status: String,
    pub queue_depth: usize,
    pub awaiting_approval: usize,
    pub carousel: usize,
    pub latency_ms: u64,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub backend: String,
}

/// GET /health: liveness plus queue counters.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // Measures how long the queue lock takes to acquire under current load.
    let start = std::time::Instant::now();
    let queue_depth = state.queue.queue_depth().await;
    let awaiting_approval = state.queue.awaiting_count().await;
    let carousel = state.queue.carousel_len().await;

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            queue: QueueHealth {
                status: "ok".to_string(),
                queue_depth,
                awaiting_approval,
                carousel,
                latency_ms: start.elapsed().as_millis() as u64,
            },
            storage: ComponentHealth {
                status: "ok".to_string(),
                backend: state.storage.name().to_string(),
            },
        },
    };

    (StatusCode::OK, Json(response))
}

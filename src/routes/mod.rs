use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;
use crate::services::review_queue::ReviewError;

pub mod addresses;
pub mod carousel;
pub mod form;
pub mod fracture;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod results;

/// Review API routes (everything except the metrics scrape endpoint).
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/animal_types", get(addresses::animal_types))
        .route("/api/v1/storage/addresses", post(addresses::create_address))
        .route("/api/v1/jobs", post(jobs::submit_job))
        .route("/api/v1/jobs/next", get(jobs::next_job))
        .route("/api/v1/jobs/{job_id}/results", post(jobs::submit_result))
        .route("/api/v1/jobs/{job_id}/fracture", post(jobs::apply_fracture))
        .route("/api/v1/jobs/{job_id}/confirm", post(jobs::confirm_job))
        .route("/api/v1/results", get(results::list_results))
        .route("/api/v1/results/{job_id}/{option}", get(results::result_image))
        .route("/api/v1/carousel", get(carousel::list_carousel))
        .route("/api/v1/carousel/{index}/{option}", get(carousel::carousel_image))
        .route("/api/v1/fracture", post(fracture::apply_fracture))
        .with_state(state)
}

impl From<ReviewError> for StatusCode {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
            ReviewError::InvalidChoice { .. } | ReviewError::Decode(_) => StatusCode::BAD_REQUEST,
            ReviewError::Storage(_) => StatusCode::BAD_GATEWAY,
            ReviewError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

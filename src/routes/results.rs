use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::app_state::AppState;
use crate::models::job::{JobId, ResultOption};
use crate::models::review::{PendingJobView, ResultsResponse};

/// GET /api/v1/results: Jobs awaiting approval with image URLs.
pub async fn list_results(State(state): State<AppState>) -> Json<ResultsResponse> {
    let jobs = state
        .queue
        .list_pending()
        .await
        .into_iter()
        .map(|pending| PendingJobView {
            job_id: pending.job_id,
            original: result_url(pending.job_id, "original"),
            results: (0..pending.result_count)
                .map(|choice| result_url(pending.job_id, &choice.to_string()))
                .collect(),
            metadata: pending.metadata,
            remaining_dispatches: pending.remaining_dispatches,
        })
        .collect();

    Json(ResultsResponse {
        jobs,
        results_per_image: state.queue.settings().results_per_image,
    })
}

/// GET /api/v1/results/{job_id}/{option}: Original photo or one candidate.
pub async fn result_image(
    State(state): State<AppState>,
    Path((job_id, option)): Path<(u64, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    let option: ResultOption = option.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let image = state.queue.result_image(JobId(job_id), option).await?;

    // Candidates can be replaced in place, so never let clients cache them.
    Ok((
        [
            (CONTENT_TYPE, "image/png"),
            (CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (PRAGMA, "no-cache"),
            (EXPIRES, "0"),
        ],
        image,
    ))
}

fn result_url(job_id: JobId, option: &str) -> String {
    format!("/api/v1/results/{job_id}/{option}")
}

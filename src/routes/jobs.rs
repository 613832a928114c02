use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::imaging::FractureParams;
use crate::models::job::{ConfirmAction, JobId, NewJob, OwnerRef};
use crate::models::review::{StatusResponse, SubmitJobRequest, SubmitJobResponse};
use crate::routes::form::MultipartForm;

/// POST /api/v1/jobs: Submit a photo plus owner details for review.
pub async fn submit_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SubmitJobResponse>, StatusCode> {
    let mut form = MultipartForm::read(multipart).await?;
    let image = form.require_file("file")?;

    // Validate image format using the `image` crate
    image::guess_format(&image).map_err(|_| StatusCode::UNSUPPORTED_MEDIA_TYPE)?;

    let request = SubmitJobRequest {
        first_name: form.require_text("first_name")?.to_string(),
        last_name: form.require_text("last_name")?.to_string(),
        animal_name: form.require_text("animal_name")?.to_string(),
        qr_content: form.require_text("qr_content")?.to_string(),
        animal_type: form.text("animal_type").unwrap_or("other").to_string(),
        broken_bone: form.parse("broken_bone")?.unwrap_or(false),
    };
    request
        .validate()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;
    if !state.config.animal_types().contains(&request.animal_type) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let job_id = state
        .queue
        .submit(NewJob {
            original_image: image,
            owner_ref: OwnerRef::parse(&request.qr_content),
            metadata: request.metadata(),
        })
        .await;

    Ok(Json(SubmitJobResponse {
        status: "success".to_string(),
        job_id,
        current_jobs: state.queue.queue_depth().await,
    }))
}

/// GET /api/v1/jobs/next: Fetch the next photo for a worker.
///
/// The job id and metadata travel as response headers; 204 when idle.
pub async fn next_job(State(state): State<AppState>) -> Response {
    let Some(job) = state.queue.dequeue().await else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let mut response = ([(CONTENT_TYPE, "image/png")], job.original_image).into_response();
    let headers = response.headers_mut();
    let meta = &job.metadata;
    for (name, value) in [
        ("img_id", job.id.to_string()),
        ("first_name", meta.first_name.clone()),
        ("last_name", meta.last_name.clone()),
        ("animal_name", meta.animal_name.clone()),
        ("animal_type", meta.animal_type.clone()),
    ] {
        // Names outside the visible ASCII range cannot travel as headers.
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(_) => {
                tracing::debug!(
                    job_id = %job.id,
                    header = name,
                    "Skipping non-ASCII metadata header"
                );
            }
        }
    }
    response
}

/// POST /api/v1/jobs/{job_id}/results: Worker hands in a candidate result.
pub async fn submit_result(
    State(state): State<AppState>,
    Path(job_id): Path<u64>,
    multipart: Multipart,
) -> Result<Json<StatusResponse>, StatusCode> {
    let mut form = MultipartForm::read(multipart).await?;
    let result = form.require_file("result")?;

    state.queue.submit_result(JobId(job_id), result).await?;
    Ok(Json(StatusResponse::success()))
}

/// POST /api/v1/jobs/{job_id}/fracture: Composite a fracture overlay onto a
/// pending candidate.
pub async fn apply_fracture(
    State(state): State<AppState>,
    Path(job_id): Path<u64>,
    multipart: Multipart,
) -> Result<Json<StatusResponse>, StatusCode> {
    let mut form = MultipartForm::read(multipart).await?;
    let overlay = form.require_file("overlay_file")?;
    let choice: usize = form.require("choice")?;
    let params = fracture_params(&form)?;

    state
        .queue
        .composite_overlay(JobId(job_id), choice, &overlay, params)
        .await?;
    Ok(Json(StatusResponse::success()))
}

/// POST /api/v1/jobs/{job_id}/confirm: Reviewer confirms, retries or
/// cancels a job.
pub async fn confirm_job(
    State(state): State<AppState>,
    Path(job_id): Path<u64>,
    multipart: Multipart,
) -> Result<Json<StatusResponse>, StatusCode> {
    let mut form = MultipartForm::read(multipart).await?;
    let action: ConfirmAction = form.require("action")?;
    let choice: usize = form.parse("choice")?.unwrap_or(0);
    let image = form.take_file("image");

    state
        .queue
        .resolve(JobId(job_id), action, choice, image)
        .await?;
    Ok(Json(StatusResponse::success()))
}

/// Placement fields shared by the fracture endpoints.
pub fn fracture_params(form: &MultipartForm) -> Result<FractureParams, StatusCode> {
    Ok(FractureParams {
        x: form.require("x")?,
        y: form.require("y")?,
        scale: form.require("scale")?,
        noise_std: form.require("noise")?,
    })
}

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::app_state::AppState;
use crate::models::job::CarouselSide;
use crate::models::review::CarouselResponse;

/// GET /api/v1/carousel: URLs of recently confirmed pairs, newest first.
pub async fn list_carousel(State(state): State<AppState>) -> Json<CarouselResponse> {
    let len = state.queue.carousel_len().await;
    Json(CarouselResponse {
        originals: (0..len).map(|i| carousel_url(i, CarouselSide::Original)).collect(),
        xrays: (0..len).map(|i| carousel_url(i, CarouselSide::Xray)).collect(),
    })
}

/// GET /api/v1/carousel/{index}/{option}: One side of a carousel entry.
pub async fn carousel_image(
    State(state): State<AppState>,
    Path((index, option)): Path<(usize, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    let side: CarouselSide = option.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let image = state
        .queue
        .carousel_image(index, side)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(([(CONTENT_TYPE, "image/png")], image))
}

fn carousel_url(index: usize, side: CarouselSide) -> String {
    format!("/api/v1/carousel/{index}/{side}")
}

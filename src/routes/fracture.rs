use axum::extract::Multipart;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::imaging::apply_fracture as composite;
use crate::imaging::pixel::{decode_color, decode_overlay, encode_png};
use crate::routes::form::MultipartForm;
use crate::routes::jobs::fracture_params;

/// POST /api/v1/fracture: Composite an overlay onto an uploaded image and
/// return the PNG, without touching the review queue.
pub async fn apply_fracture(multipart: Multipart) -> Result<impl IntoResponse, StatusCode> {
    let mut form = MultipartForm::read(multipart).await?;
    let image = form.require_file("image_file")?;
    let overlay = form.require_file("overlay_file")?;
    let params = fracture_params(&form)?;

    let base = decode_color(&image).map_err(|_| StatusCode::BAD_REQUEST)?;
    let overlay = decode_overlay(&overlay).map_err(|_| StatusCode::BAD_REQUEST)?;

    let encoded = tokio::task::spawn_blocking(move || {
        let mut rng = StdRng::from_entropy();
        encode_png(&composite(base, &overlay, &params, &mut rng))
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to encode composited image");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((
        [
            (CONTENT_TYPE, "image/png"),
            (CONTENT_DISPOSITION, "attachment; filename=\"fractured_image.png\""),
        ],
        encoded,
    ))
}

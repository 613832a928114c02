use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::review::{AddressResponse, AnimalTypesResponse};

/// POST /api/v1/storage/addresses: Mint a new archive destination, e.g. to
/// print on a QR code.
pub async fn create_address(
    State(state): State<AppState>,
) -> Result<Json<AddressResponse>, StatusCode> {
    let address = state.storage.create_address().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to create storage address");
        StatusCode::BAD_GATEWAY
    })?;
    Ok(Json(AddressResponse { address }))
}

/// GET /api/v1/animal_types
pub async fn animal_types(State(state): State<AppState>) -> Json<AnimalTypesResponse> {
    Json(AnimalTypesResponse {
        types: state.config.animal_types(),
    })
}

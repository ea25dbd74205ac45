//! GET /api/v1/measurements: the current batch for all points.

use axum::extract::State;
use axum::Json;

use crate::errors::{AppError, ErrorResponse};
use crate::models::Measurement;
use crate::routes::AppState;

/// Get measurements for every configured point, sorted by point name.
///
/// Served from cache while fresh. All-or-nothing: if any point fails after
/// retries, the request fails.
#[utoipa::path(
    get,
    path = "/api/v1/measurements",
    tag = "Measurements",
    responses(
        (status = 200, description = "Measurements sorted by point name", body = Vec<Measurement>),
        (status = 502, description = "Upstream service failure", body = ErrorResponse),
        (status = 504, description = "Upstream timeout", body = ErrorResponse),
    )
)]
pub async fn list_measurements(
    State(state): State<AppState>,
) -> Result<Json<Vec<Measurement>>, AppError> {
    let cancel = state.shutdown.child_token();
    let measurements = state.measurements.current(&cancel).await?;
    Ok(Json(measurements))
}

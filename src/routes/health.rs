use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::AppState;
use crate::services::health::HealthSummary;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when every upstream is healthy, "degraded" otherwise)
    pub status: String,
    /// API version
    pub version: String,
    /// Per-upstream check results
    pub upstream: HealthSummary,
}

/// Health check endpoint.
///
/// Checks both Open-Meteo endpoints once, without retries. Returns status
/// "degraded" (still 200) if any upstream is unhealthy, so load balancers can
/// distinguish partial failures.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let upstream = state.health.check_all().await;

    Json(HealthResponse {
        status: if upstream.overall_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream,
    })
}

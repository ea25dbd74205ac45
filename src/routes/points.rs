use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::GeoPoint;
use crate::routes::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct PointsResponse {
    /// Point used by the dashboard when none is requested
    pub default_point: String,
    pub points: Vec<GeoPoint>,
}

/// List the configured points.
#[utoipa::path(
    get,
    path = "/api/v1/points",
    tag = "Points",
    responses(
        (status = 200, description = "Configured points", body = PointsResponse),
    )
)]
pub async fn list_points(State(state): State<AppState>) -> Json<PointsResponse> {
    Json(PointsResponse {
        default_point: state.config.default_point.clone(),
        points: state.measurements.points().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::state_for;
    use wiremock::MockServer;

    #[tokio::test]
    async fn test_list_points() {
        let server = MockServer::start().await;
        let Json(body) = list_points(State(state_for(&server))).await;
        assert_eq!(body.default_point, "New Delhi");
        let names: Vec<_> = body.points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["New Delhi", "Mumbai", "Bengaluru", "Hyderabad"]);
    }
}

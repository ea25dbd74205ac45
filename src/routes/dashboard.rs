//! Dashboard HTTP endpoints.
//!
//! - GET /api/v1/dashboard?point=NAME
//! - GET /api/v1/dashboard/summary?point=NAME
//!
//! `point` defaults to the configured default point.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::{AppError, ErrorResponse};
use crate::models::DashboardResult;
use crate::routes::AppState;
use crate::services::dashboard::{self, DashboardSummary};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Point name (e.g. "Mumbai"); the default point when omitted
    pub point: Option<String>,
}

async fn build_dashboard(state: &AppState, query: DashboardQuery) -> Result<DashboardResult, AppError> {
    let selected = query
        .point
        .unwrap_or_else(|| state.config.default_point.clone());

    // Unknown points are rejected before any upstream request
    if !state.config.points.iter().any(|p| p.name == selected) {
        return Err(AppError::NotFound(selected));
    }

    let cancel = state.shutdown.child_token();
    let measurements = state.measurements.current(&cancel).await?;
    Ok(dashboard::build(&measurements, &selected, &state.config.thresholds())?)
}

/// Get the dashboard for one point.
///
/// Contains all measurements, the recommendation for the selected point,
/// hazard warnings over all points and the wind/PM2.5 correlation table.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "Dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard for the selected point", body = DashboardResult),
        (status = 404, description = "Unknown point", body = ErrorResponse),
        (status = 502, description = "Upstream service failure", body = ErrorResponse),
        (status = 504, description = "Upstream timeout", body = ErrorResponse),
    )
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResult>, AppError> {
    let result = build_dashboard(&state, query).await?;
    Ok(Json(result))
}

/// Get a display summary for one point.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/summary",
    tag = "Dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Summary for the selected point", body = DashboardSummary),
        (status = 404, description = "Unknown point", body = ErrorResponse),
        (status = 502, description = "Upstream service failure", body = ErrorResponse),
        (status = 504, description = "Upstream timeout", body = ErrorResponse),
    )
)]
pub async fn get_dashboard_summary(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSummary>, AppError> {
    let result = build_dashboard(&state, query).await?;
    let summary = dashboard::summarize(&result, &state.config.thresholds())?;
    Ok(Json(summary))
}

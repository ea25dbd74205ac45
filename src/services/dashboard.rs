//! Dashboard aggregation over one batch of measurements.
//!
//! Pure: no I/O, no retries. Input is the name-sorted batch from the
//! orchestrator; it is re-sorted here so any caller gets the same ordering.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::PipelineError;
use crate::helpers::{format_pm25, format_weather, FormattedWeather};
use crate::models::{CorrelationRow, DashboardResult, Measurement, Status};
use crate::services::recommendation::{detect_hazards, recommend, Thresholds};

/// Assemble the dashboard for `selected_point`.
///
/// Hazard warnings cover the whole batch; the recommendation covers only the
/// selected point.
pub fn build(
    measurements: &[Measurement],
    selected_point: &str,
    thresholds: &Thresholds,
) -> Result<DashboardResult, PipelineError> {
    let mut all_measurements = measurements.to_vec();
    all_measurements.sort_by(|a, b| a.point_name().cmp(b.point_name()));

    let selected = all_measurements
        .iter()
        .find(|m| m.point_name() == selected_point)
        .ok_or_else(|| PipelineError::PointNotFound(selected_point.to_string()))?;

    let recommendation = recommend(selected, thresholds);
    let hazard_warnings = detect_hazards(&all_measurements, thresholds);
    let correlation = build_correlation_table(&all_measurements);

    Ok(DashboardResult {
        selected_point: selected_point.to_string(),
        recommendation,
        hazard_warnings,
        correlation,
        all_measurements,
    })
}

/// One row per measurement, in input order.
pub fn build_correlation_table(measurements: &[Measurement]) -> Vec<CorrelationRow> {
    measurements
        .iter()
        .map(|m| CorrelationRow {
            point_name: m.point_name().to_string(),
            pm25: m.pm25(),
            temperature: m.temperature(),
            wind_speed: m.wind_speed(),
            precipitation: m.precipitation(),
            latitude: m.coordinates().latitude,
            longitude: m.coordinates().longitude,
            fetched_at: m.fetched_at(),
        })
        .collect()
}

/// Compact view of the selected point for display.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub selected_point: String,
    pub pm25: f64,
    pub temperature: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub pm25_display: String,
    pub weather_display: FormattedWeather,
    pub status: Status,
    pub message: String,
    pub is_safe: bool,
    /// Number of points in the batch
    pub total_points: usize,
    pub healthy_threshold: f64,
    pub hazardous_threshold: f64,
    pub hazard_count: usize,
    pub fetched_at: DateTime<Utc>,
}

pub fn summarize(
    result: &DashboardResult,
    thresholds: &Thresholds,
) -> Result<DashboardSummary, PipelineError> {
    let selected = result
        .all_measurements
        .iter()
        .find(|m| m.point_name() == result.selected_point)
        .ok_or_else(|| PipelineError::PointNotFound(result.selected_point.clone()))?;

    Ok(DashboardSummary {
        selected_point: result.selected_point.clone(),
        pm25: selected.pm25(),
        temperature: selected.temperature(),
        wind_speed: selected.wind_speed(),
        precipitation: selected.precipitation(),
        pm25_display: format_pm25(selected.pm25()),
        weather_display: format_weather(
            selected.temperature(),
            selected.wind_speed(),
            selected.precipitation(),
        ),
        status: result.recommendation.status,
        message: result.recommendation.message.clone(),
        is_safe: result.recommendation.is_safe,
        total_points: result.all_measurements.len(),
        healthy_threshold: thresholds.healthy_pm25,
        hazardous_threshold: thresholds.hazardous_pm25,
        hazard_count: result.hazard_warnings.len(),
        fetched_at: selected.fetched_at(),
    })
}

//! Core data model: points, measurements, recommendations and dashboard results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::PipelineError;
use crate::services::validator::validate_measurement;

/// A named geographic point for which measurements are acquired.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GeoPoint {
    /// Unique point name (e.g. "New Delhi")
    pub name: String,
    /// Latitude in degrees, [-90, 90]
    pub latitude: f64,
    /// Longitude in degrees, [-180, 180]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// Combined air-quality and weather reading for one point.
///
/// Only constructible through [`Measurement::try_new`], which validates every
/// value first, so a `Measurement` always satisfies its range invariants.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Measurement {
    point_name: String,
    /// PM2.5 concentration in μg/m³
    pm25: f64,
    /// Air temperature in °C
    temperature: f64,
    /// Wind speed in km/h
    wind_speed: f64,
    /// Precipitation in mm
    precipitation: f64,
    fetched_at: DateTime<Utc>,
    coordinates: GeoPoint,
}

impl Measurement {
    pub fn try_new(
        point: GeoPoint,
        pm25: f64,
        temperature: f64,
        wind_speed: f64,
        precipitation: f64,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, PipelineError> {
        validate_measurement(pm25, temperature, wind_speed, precipitation)?;
        Ok(Self {
            point_name: point.name.clone(),
            pm25,
            temperature,
            wind_speed,
            precipitation,
            fetched_at,
            coordinates: point,
        })
    }

    pub fn point_name(&self) -> &str {
        &self.point_name
    }

    pub fn pm25(&self) -> f64 {
        self.pm25
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn wind_speed(&self) -> f64 {
        self.wind_speed
    }

    pub fn precipitation(&self) -> f64 {
        self.precipitation
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn coordinates(&self) -> &GeoPoint {
        &self.coordinates
    }
}

/// Traffic-light recommendation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Green,
    Yellow,
    Red,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Green => "green",
            Status::Yellow => "yellow",
            Status::Red => "red",
        }
    }
}

/// Snapshot of the values a recommendation was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RecommendationConditions {
    pub point_name: String,
    pub pm25: f64,
    pub temperature: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Cycling recommendation for one point.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Recommendation {
    pub status: Status,
    pub message: String,
    pub is_safe: bool,
    pub supporting_conditions: RecommendationConditions,
}

/// One row of the wind vs. PM2.5 correlation table.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CorrelationRow {
    pub point_name: String,
    pub pm25: f64,
    pub temperature: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Everything the presentation layer needs for one refresh cycle.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardResult {
    /// All measurements, sorted by point name
    pub all_measurements: Vec<Measurement>,
    pub selected_point: String,
    /// Recommendation for `selected_point`
    pub recommendation: Recommendation,
    /// One warning per point above the hazardous PM2.5 threshold, in name order
    pub hazard_warnings: Vec<String>,
    pub correlation: Vec<CorrelationRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delhi() -> GeoPoint {
        GeoPoint::new("New Delhi", 28.6139, 77.2090)
    }

    #[test]
    fn test_measurement_try_new_valid() {
        let m = Measurement::try_new(delhi(), 42.0, 31.5, 12.0, 0.0, Utc::now()).unwrap();
        assert_eq!(m.point_name(), "New Delhi");
        assert_eq!(m.pm25(), 42.0);
        assert_eq!(m.coordinates().latitude, 28.6139);
    }

    #[test]
    fn test_measurement_try_new_rejects_out_of_range() {
        let err = Measurement::try_new(delhi(), 1500.0, 20.0, 5.0, 0.0, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidMeasurement { field: "pm25", .. }
        ));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&Status::Yellow).unwrap();
        assert_eq!(json, "\"yellow\"");
        assert_eq!(Status::Red.as_str(), "red");
    }

    #[test]
    fn test_measurement_serializes_fields() {
        let m = Measurement::try_new(delhi(), 42.0, 31.5, 12.0, 0.4, Utc::now()).unwrap();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["point_name"], "New Delhi");
        assert_eq!(json["precipitation"], 0.4);
        assert_eq!(json["coordinates"]["longitude"], 77.2090);
    }
}

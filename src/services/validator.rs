//! Range checks for coordinates and measurement values.
//!
//! Both checks are pure and produce non-retryable errors: a bad coordinate is a
//! configuration fault, a bad measurement is an implausible upstream value.

use crate::errors::PipelineError;

pub const PM25_MAX: f64 = 1000.0;
pub const TEMPERATURE_MIN: f64 = -100.0;
pub const TEMPERATURE_MAX: f64 = 60.0;
pub const WIND_SPEED_MAX: f64 = 200.0;

/// Fail with `InvalidCoordinate` unless lat ∈ [-90, 90] and lon ∈ [-180, 180].
///
/// NaN is rejected as well.
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), PipelineError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(PipelineError::InvalidCoordinate(format!(
            "latitude {} must be between -90 and 90",
            lat
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(PipelineError::InvalidCoordinate(format!(
            "longitude {} must be between -180 and 180",
            lon
        )));
    }
    Ok(())
}

/// Check the four measurement values in field order and report the first
/// violation.
pub fn validate_measurement(
    pm25: f64,
    temperature: f64,
    wind_speed: f64,
    precipitation: f64,
) -> Result<(), PipelineError> {
    check_range("pm25", pm25, 0.0, PM25_MAX)?;
    check_range("temperature", temperature, TEMPERATURE_MIN, TEMPERATURE_MAX)?;
    check_range("wind_speed", wind_speed, 0.0, WIND_SPEED_MAX)?;
    check_range("precipitation", precipitation, 0.0, f64::INFINITY)?;
    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), PipelineError> {
    if value.is_nan() || value < min {
        return Err(PipelineError::InvalidMeasurement {
            field,
            value,
            bound: format!(">= {}", min),
        });
    }
    if value > max {
        return Err(PipelineError::InvalidMeasurement {
            field,
            value,
            bound: format!("<= {}", max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates() {
        assert!(validate_coordinates(28.6139, 77.2090).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(90.0, 180.0).is_ok());
    }

    #[test]
    fn test_invalid_latitude() {
        let err = validate_coordinates(90.5, 0.0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCoordinate(ref m) if m.contains("latitude")));
    }

    #[test]
    fn test_invalid_longitude() {
        let err = validate_coordinates(0.0, -180.01).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCoordinate(ref m) if m.contains("longitude")));
    }

    #[test]
    fn test_nan_coordinate_rejected() {
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_valid_measurement_bounds_inclusive() {
        assert!(validate_measurement(0.0, -100.0, 0.0, 0.0).is_ok());
        assert!(validate_measurement(1000.0, 60.0, 200.0, 500.0).is_ok());
    }

    #[test]
    fn test_measurement_reports_first_offending_field() {
        // Both pm25 and wind are bad; pm25 is checked first
        let err = validate_measurement(-1.0, 20.0, 300.0, 0.0).unwrap_err();
        match err {
            PipelineError::InvalidMeasurement { field, bound, .. } => {
                assert_eq!(field, "pm25");
                assert_eq!(bound, ">= 0");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_measurement_upper_bounds() {
        let cases = [
            (1000.1, 20.0, 5.0, 0.0, "pm25"),
            (10.0, 60.5, 5.0, 0.0, "temperature"),
            (10.0, -100.5, 5.0, 0.0, "temperature"),
            (10.0, 20.0, 200.1, 0.0, "wind_speed"),
            (10.0, 20.0, 5.0, -0.1, "precipitation"),
        ];
        for (pm25, temp, wind, precip, expected) in cases {
            match validate_measurement(pm25, temp, wind, precip) {
                Err(PipelineError::InvalidMeasurement { field, .. }) => {
                    assert_eq!(field, expected)
                }
                other => panic!("expected {} violation, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_measurement_error_not_retryable() {
        let err = validate_measurement(5000.0, 20.0, 5.0, 0.0).unwrap_err();
        assert!(!err.is_retryable());
    }
}

//! Display formatting for measurement values.
//!
//! All values render with one decimal place and their unit:
//!
//! - PM2.5: `"87.3 μg/m³"`
//! - temperature: `"31.2°C"`, wind: `"14.5 km/h"`, precipitation: `"0.0 mm"`
//!
//! Non-finite inputs render as `"N/A"` rather than `"NaN μg/m³"`.

use serde::Serialize;
use utoipa::ToSchema;

const NOT_AVAILABLE: &str = "N/A";

/// Formatted weather values for display.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FormattedWeather {
    pub temperature: String,
    pub wind_speed: String,
    pub precipitation: String,
}

fn with_unit(v: f64, unit: &str) -> String {
    if !v.is_finite() {
        tracing::warn!("Formatting received non-finite value {}", v);
        return NOT_AVAILABLE.to_string();
    }
    format!("{:.1}{}", v, unit)
}

pub(crate) fn format_pm25(v: f64) -> String {
    with_unit(v, " μg/m³")
}

pub(crate) fn format_weather(temperature: f64, wind_speed: f64, precipitation: f64) -> FormattedWeather {
    FormattedWeather {
        temperature: with_unit(temperature, "°C"),
        wind_speed: with_unit(wind_speed, " km/h"),
        precipitation: with_unit(precipitation, " mm"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pm25() {
        assert_eq!(format_pm25(87.34), "87.3 μg/m³");
    }

    #[test]
    fn test_format_pm25_rounds() {
        // 12.06 rounded to 1dp → 12.1
        assert_eq!(format_pm25(12.06), "12.1 μg/m³");
    }

    #[test]
    fn test_format_pm25_nan() {
        assert_eq!(format_pm25(f64::NAN), "N/A");
    }

    #[test]
    fn test_format_weather() {
        let w = format_weather(31.24, 14.5, 0.0);
        assert_eq!(w.temperature, "31.2°C");
        assert_eq!(w.wind_speed, "14.5 km/h");
        assert_eq!(w.precipitation, "0.0 mm");
    }

    #[test]
    fn test_format_weather_negative_temperature() {
        assert_eq!(format_weather(-3.0, 0.0, 0.0).temperature, "-3.0°C");
    }

    #[test]
    fn test_format_weather_infinity() {
        let w = format_weather(20.0, f64::INFINITY, 1.0);
        assert_eq!(w.wind_speed, "N/A");
        assert_eq!(w.precipitation, "1.0 mm");
    }
}

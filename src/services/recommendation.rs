//! Hazard detection and cycling recommendations.
//!
//! Classification precedence for one measurement:
//!
//! 1. Red: PM2.5 above the hazardous threshold, or temperature above the high threshold
//! 2. Yellow: PM2.5 at/above the healthy threshold, or wind above the moderate threshold
//! 3. Green: otherwise
//!
//! Precipitation is applied last and can only worsen the result: Green becomes
//! Yellow, Yellow/Red keep their status and gain a precipitation clause.

use crate::models::{Measurement, Recommendation, RecommendationConditions, Status};

/// Decision thresholds. Assumed validated (hazardous > healthy, etc.).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// PM2.5 (μg/m³) at or above which air is no longer "good"
    pub healthy_pm25: f64,
    /// PM2.5 (μg/m³) above which a hazard warning is mandatory
    pub hazardous_pm25: f64,
    /// Wind (km/h) above which conditions are moderate
    pub moderate_wind: f64,
    /// Wind (km/h) above which winds are described as very high
    pub high_wind: f64,
    /// Temperature (°C) up to which it is described as comfortable
    pub comfortable_temperature: f64,
    /// Temperature (°C) above which heat is hazardous
    pub high_temperature: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            healthy_pm25: 50.0,
            hazardous_pm25: 100.0,
            moderate_wind: 20.0,
            high_wind: 30.0,
            comfortable_temperature: 30.0,
            high_temperature: 35.0,
        }
    }
}

/// One warning per measurement whose PM2.5 exceeds the hazardous threshold,
/// in input order.
pub fn detect_hazards(measurements: &[Measurement], thresholds: &Thresholds) -> Vec<String> {
    measurements
        .iter()
        .filter(|m| m.pm25() > thresholds.hazardous_pm25)
        .map(|m| {
            let warning = format!(
                "HAZARDOUS AIR QUALITY WARNING: {} has PM2.5 level of {:.1} μg/m³, \
                 which exceeds the hazardous threshold of {:.1} μg/m³. Cycling should be avoided.",
                m.point_name(),
                m.pm25(),
                thresholds.hazardous_pm25
            );
            tracing::warn!("{}", warning);
            warning
        })
        .collect()
}

/// Classify one measurement. Pure: identical input gives identical output.
pub fn recommend(m: &Measurement, thresholds: &Thresholds) -> Recommendation {
    let pm25 = m.pm25();
    let temperature = m.temperature();
    let wind_speed = m.wind_speed();
    let precipitation = m.precipitation();

    let polluted = pm25 > thresholds.hazardous_pm25;
    let hot = temperature > thresholds.high_temperature;

    let (mut status, mut message) = if polluted || hot {
        let message = match (polluted, hot) {
            (true, true) => format!(
                "Hazardous conditions: High pollution (PM2.5: {:.1} μg/m³) and extreme heat ({:.1}°C). \
                 Avoid outdoor exertion.",
                pm25, temperature
            ),
            (true, false) => format!(
                "Hazardous air quality: PM2.5 level of {:.1} μg/m³ is dangerous. \
                 Avoid cycling and outdoor activities.",
                pm25
            ),
            _ => format!(
                "Extreme heat warning: Temperature of {:.1}°C is too hot for safe cycling. \
                 Stay indoors or use air-conditioned transport.",
                temperature
            ),
        };
        (Status::Red, message)
    } else if pm25 >= thresholds.healthy_pm25 || wind_speed > thresholds.moderate_wind {
        let mut conditions = Vec::with_capacity(2);
        if pm25 >= thresholds.healthy_pm25 {
            conditions.push(format!("moderate pollution (PM2.5: {:.1} μg/m³)", pm25));
        }
        if wind_speed > thresholds.high_wind {
            conditions.push(format!("very high winds ({:.1} km/h)", wind_speed));
        } else if wind_speed > thresholds.moderate_wind {
            conditions.push(format!("high winds ({:.1} km/h)", wind_speed));
        }
        let message = format!(
            "Moderate conditions with {}. Short cycling trips may be acceptable with precautions.",
            conditions.join(" and ")
        );
        (Status::Yellow, message)
    } else {
        let feel = if temperature <= thresholds.comfortable_temperature {
            "comfortable"
        } else {
            "warm"
        };
        let message = format!(
            "Great cycling conditions! PM2.5 is low ({:.1} μg/m³) and temperature is {} ({:.1}°C).",
            pm25, feel, temperature
        );
        (Status::Green, message)
    };

    if precipitation > 0.0 {
        if status == Status::Green {
            status = Status::Yellow;
            message = format!(
                "Good air quality and temperature, but precipitation detected ({:.1} mm). \
                 Consider covered transport or wait for rain to stop.",
                precipitation
            );
        } else {
            message.push_str(&format!(
                " Additionally, precipitation ({:.1} mm) makes cycling conditions more challenging.",
                precipitation
            ));
        }
    }

    tracing::debug!(
        "Generated {} recommendation for {}",
        status.as_str(),
        m.point_name()
    );

    Recommendation {
        status,
        message,
        is_safe: status == Status::Green,
        supporting_conditions: RecommendationConditions {
            point_name: m.point_name().to_string(),
            pm25,
            temperature,
            wind_speed,
            precipitation,
            fetched_at: m.fetched_at(),
        },
    }
}

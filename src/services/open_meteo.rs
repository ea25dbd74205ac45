//! Open-Meteo air-quality and forecast client.
//!
//! Both endpoints return the requested values under a `current` object keyed by
//! field name. See: https://open-meteo.com/en/docs

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};

use crate::errors::PipelineError;

const SERVICE_USER_AGENT: &str = "BreathableCommute/0.1";

/// Field name of the PM2.5 value on the air-quality endpoint.
const FIELD_PM25: &str = "pm2_5";
const FIELD_TEMPERATURE: &str = "temperature_2m";
const FIELD_WIND_SPEED: &str = "wind_speed_10m";
const FIELD_PRECIPITATION: &str = "precipitation";

/// The two logical upstream endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    AirQuality,
    Weather,
}

impl EndpointKind {
    /// Value of the `current` query parameter for this endpoint.
    pub fn current_fields(&self) -> &'static str {
        match self {
            EndpointKind::AirQuality => FIELD_PM25,
            EndpointKind::Weather => "temperature_2m,wind_speed_10m,precipitation",
        }
    }

    pub fn service_name(&self) -> &'static str {
        match self {
            EndpointKind::AirQuality => "Open-Meteo Air Quality API",
            EndpointKind::Weather => "Open-Meteo Weather API",
        }
    }
}

/// Base URLs of the two endpoints.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub air_quality_url: String,
    pub weather_url: String,
}

impl Endpoints {
    pub fn url(&self, kind: EndpointKind) -> &str {
        match kind {
            EndpointKind::AirQuality => &self.air_quality_url,
            EndpointKind::Weather => &self.weather_url,
        }
    }
}

/// Build the query parameters for one request.
pub fn build_query(kind: EndpointKind, lat: f64, lon: f64) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", lat.to_string()),
        ("longitude", lon.to_string()),
        ("current", kind.current_fields().to_string()),
    ]
}

/// A single HTTP GET returning a JSON body.
///
/// Implementations classify their own failures into the retryable variants of
/// [`PipelineError`]. Per-attempt timeouts are enforced by the caller.
pub trait Transport: Send + Sync {
    fn get_json(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> impl Future<Output = Result<serde_json::Value, PipelineError>> + Send;
}

/// reqwest-backed transport. Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
}

impl OpenMeteoClient {
    pub fn new(pool_max_idle_per_host: usize) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(SERVICE_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for OpenMeteoClient {
    fn get_json(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> impl Future<Output = Result<serde_json::Value, PipelineError>> + Send {
        let request = self.client.get(url).query(query);
        async move {
            let response = request.send().await.map_err(classify_reqwest_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(PipelineError::Http {
                    status: status.as_u16(),
                });
            }

            response.json::<serde_json::Value>().await.map_err(|e| {
                if e.is_timeout() {
                    classify_reqwest_error(e)
                } else {
                    PipelineError::MalformedResponse(format!("invalid JSON body: {}", e))
                }
            })
        }
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> PipelineError {
    if e.is_timeout() {
        // reqwest does not expose the configured duration
        PipelineError::Timeout(Duration::ZERO)
    } else {
        PipelineError::Network(e.to_string())
    }
}

// --- Response parsing ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirQualityReading {
    pub pm25: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherReading {
    pub temperature: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
}

/// Extract a numeric value at `current.<field>`.
///
/// A missing `current` object, a missing field, `null` or a non-numeric
/// value are all protocol violations.
fn current_number(body: &serde_json::Value, field: &str) -> Result<f64, PipelineError> {
    let current = body
        .get("current")
        .filter(|c| c.is_object())
        .ok_or_else(|| {
            PipelineError::MalformedResponse("missing 'current' field".to_string())
        })?;

    match current.get(field) {
        None => Err(PipelineError::MalformedResponse(format!(
            "missing '{}' field",
            field
        ))),
        Some(serde_json::Value::Null) => Err(PipelineError::MalformedResponse(format!(
            "null '{}' value",
            field
        ))),
        Some(v) => v.as_f64().ok_or_else(|| {
            PipelineError::MalformedResponse(format!("non-numeric '{}' value: {}", field, v))
        }),
    }
}

pub fn parse_air_quality(body: &serde_json::Value) -> Result<AirQualityReading, PipelineError> {
    Ok(AirQualityReading {
        pm25: current_number(body, FIELD_PM25)?,
    })
}

pub fn parse_weather(body: &serde_json::Value) -> Result<WeatherReading, PipelineError> {
    Ok(WeatherReading {
        temperature: current_number(body, FIELD_TEMPERATURE)?,
        wind_speed: current_number(body, FIELD_WIND_SPEED)?,
        precipitation: current_number(body, FIELD_PRECIPITATION)?,
    })
}

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use thiserror::Error;

use crate::models::GeoPoint;
use crate::services::fetcher::RetryPolicy;
use crate::services::open_meteo::Endpoints;
use crate::services::orchestrator::BatchLimits;
use crate::services::recommendation::Thresholds;
use crate::services::validator::validate_coordinates;

const DEFAULT_AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";
const DEFAULT_POINTS: &str = "New Delhi:28.6139:77.2090;Mumbai:19.0760:72.8777;\
                              Bengaluru:12.9716:77.5946;Hyderabad:17.3850:78.4867";
const DEFAULT_POINT: &str = "New Delhi";
/// Upper bound for the timeout and delay settings (one hour).
const MAX_DURATION_SECS: f64 = 3_600.0;
/// Upper bound for `MAX_RETRIES`.
const MAX_ATTEMPTS_LIMIT: u32 = 10;
/// Upper bound for `CACHE_DURATION_SECS` (one day).
const MAX_CACHE_DURATION_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Parse {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub air_quality_url: String,
    pub weather_url: String,
    pub request_timeout_secs: f64,
    /// Total attempts per endpoint call, including the first.
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub max_concurrent_requests: usize,
    /// Idle connections kept per upstream host.
    pub connection_pool_size: usize,
    pub cache_duration_secs: u64,
    pub healthy_air_quality_threshold: f64,
    pub hazardous_air_quality_threshold: f64,
    pub moderate_wind_threshold: f64,
    pub high_wind_threshold: f64,
    pub comfortable_temperature_threshold: f64,
    pub high_temperature_threshold: f64,
    pub health_check_timeout_secs: f64,
    pub points: Vec<GeoPoint>,
    pub default_point: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            port: 8080,
            air_quality_url: DEFAULT_AIR_QUALITY_URL.to_string(),
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            request_timeout_secs: 10.0,
            max_retries: 3,
            retry_delay_secs: 1.0,
            max_concurrent_requests: 10,
            connection_pool_size: 20,
            cache_duration_secs: 300,
            healthy_air_quality_threshold: thresholds.healthy_pm25,
            hazardous_air_quality_threshold: thresholds.hazardous_pm25,
            moderate_wind_threshold: thresholds.moderate_wind,
            high_wind_threshold: thresholds.high_wind,
            comfortable_temperature_threshold: thresholds.comfortable_temperature,
            high_temperature_threshold: thresholds.high_temperature,
            health_check_timeout_secs: 5.0,
            // The default string is well-formed
            points: parse_points(DEFAULT_POINTS).unwrap_or_default(),
            default_point: DEFAULT_POINT.to_string(),
        }
    }
}

fn env_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Parse {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse `name:lat:lon` entries separated by `;`.
pub fn parse_points(raw: &str) -> Result<Vec<GeoPoint>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<GeoPoint, ConfigError> {
            let invalid = |reason: &str| ConfigError::Parse {
                name: "POINTS",
                value: entry.to_string(),
                reason: reason.to_string(),
            };
            // Names may not contain ':'; coordinates are the last two fields
            let mut parts = entry.rsplitn(3, ':');
            let lon = parts.next().ok_or_else(|| invalid("missing longitude"))?;
            let lat = parts.next().ok_or_else(|| invalid("missing latitude"))?;
            let name = parts.next().ok_or_else(|| invalid("expected name:lat:lon"))?;
            let lat: f64 = lat.trim().parse().map_err(|_| invalid("latitude is not a number"))?;
            let lon: f64 = lon.trim().parse().map_err(|_| invalid("longitude is not a number"))?;
            Ok(GeoPoint::new(name.trim(), lat, lon))
        })
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let points = match std::env::var("POINTS") {
            Ok(raw) => parse_points(&raw)?,
            Err(_) => defaults.points,
        };

        let config = Self {
            port: env_or("PORT", defaults.port)?,
            air_quality_url: env_or("AIR_QUALITY_URL", defaults.air_quality_url)?,
            weather_url: env_or("WEATHER_URL", defaults.weather_url)?,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            max_retries: env_or("MAX_RETRIES", defaults.max_retries)?,
            retry_delay_secs: env_or("RETRY_DELAY_SECS", defaults.retry_delay_secs)?,
            max_concurrent_requests: env_or("MAX_CONCURRENT_REQUESTS", defaults.max_concurrent_requests)?,
            connection_pool_size: env_or("CONNECTION_POOL_SIZE", defaults.connection_pool_size)?,
            cache_duration_secs: env_or("CACHE_DURATION_SECS", defaults.cache_duration_secs)?,
            healthy_air_quality_threshold: env_or(
                "HEALTHY_AIR_QUALITY_THRESHOLD",
                defaults.healthy_air_quality_threshold,
            )?,
            hazardous_air_quality_threshold: env_or(
                "HAZARDOUS_AIR_QUALITY_THRESHOLD",
                defaults.hazardous_air_quality_threshold,
            )?,
            moderate_wind_threshold: env_or("MODERATE_WIND_THRESHOLD", defaults.moderate_wind_threshold)?,
            high_wind_threshold: env_or("HIGH_WIND_THRESHOLD", defaults.high_wind_threshold)?,
            comfortable_temperature_threshold: env_or(
                "COMFORTABLE_TEMPERATURE_THRESHOLD",
                defaults.comfortable_temperature_threshold,
            )?,
            high_temperature_threshold: env_or(
                "HIGH_TEMPERATURE_THRESHOLD",
                defaults.high_temperature_threshold,
            )?,
            health_check_timeout_secs: env_or(
                "HEALTH_CHECK_TIMEOUT_SECS",
                defaults.health_check_timeout_secs,
            )?,
            points,
            default_point: env_or("DEFAULT_POINT", defaults.default_point)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check every rule and report all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        for (name, url) in [
            ("AIR_QUALITY_URL", &self.air_quality_url),
            ("WEATHER_URL", &self.weather_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("{} must start with http:// or https://", name));
            }
        }

        let positive = [
            ("REQUEST_TIMEOUT_SECS", self.request_timeout_secs),
            ("RETRY_DELAY_SECS", self.retry_delay_secs),
            ("HEALTH_CHECK_TIMEOUT_SECS", self.health_check_timeout_secs),
            ("HEALTHY_AIR_QUALITY_THRESHOLD", self.healthy_air_quality_threshold),
            ("HAZARDOUS_AIR_QUALITY_THRESHOLD", self.hazardous_air_quality_threshold),
            ("MODERATE_WIND_THRESHOLD", self.moderate_wind_threshold),
            ("HIGH_WIND_THRESHOLD", self.high_wind_threshold),
            ("COMFORTABLE_TEMPERATURE_THRESHOLD", self.comfortable_temperature_threshold),
            ("HIGH_TEMPERATURE_THRESHOLD", self.high_temperature_threshold),
        ];
        for (name, value) in positive {
            // Also rejects NaN and infinity, which Duration::from_secs_f64 cannot take
            if !(value.is_finite() && value > 0.0) {
                errors.push(format!("{} must be positive", name));
            }
        }
        for (name, value) in [
            ("REQUEST_TIMEOUT_SECS", self.request_timeout_secs),
            ("RETRY_DELAY_SECS", self.retry_delay_secs),
            ("HEALTH_CHECK_TIMEOUT_SECS", self.health_check_timeout_secs),
        ] {
            if value > MAX_DURATION_SECS {
                errors.push(format!("{} must be at most {}", name, MAX_DURATION_SECS));
            }
        }
        if self.max_retries == 0 {
            errors.push("MAX_RETRIES must be positive".to_string());
        } else if self.max_retries > MAX_ATTEMPTS_LIMIT {
            errors.push(format!("MAX_RETRIES must be at most {}", MAX_ATTEMPTS_LIMIT));
        }
        if self.max_concurrent_requests == 0 {
            errors.push("MAX_CONCURRENT_REQUESTS must be positive".to_string());
        }
        if self.connection_pool_size == 0 {
            errors.push("CONNECTION_POOL_SIZE must be positive".to_string());
        }
        if self.cache_duration_secs > MAX_CACHE_DURATION_SECS {
            errors.push(format!(
                "CACHE_DURATION_SECS must be at most {}",
                MAX_CACHE_DURATION_SECS
            ));
        }

        if self.hazardous_air_quality_threshold <= self.healthy_air_quality_threshold {
            errors.push(
                "HAZARDOUS_AIR_QUALITY_THRESHOLD must be greater than HEALTHY_AIR_QUALITY_THRESHOLD"
                    .to_string(),
            );
        }
        if self.high_wind_threshold <= self.moderate_wind_threshold {
            errors.push("HIGH_WIND_THRESHOLD must be greater than MODERATE_WIND_THRESHOLD".to_string());
        }
        if self.high_temperature_threshold <= self.comfortable_temperature_threshold {
            errors.push(
                "HIGH_TEMPERATURE_THRESHOLD must be greater than COMFORTABLE_TEMPERATURE_THRESHOLD"
                    .to_string(),
            );
        }

        if self.points.is_empty() {
            errors.push("POINTS must contain at least one point".to_string());
        }
        let mut seen = HashSet::new();
        for point in &self.points {
            if point.name.is_empty() {
                errors.push("POINTS contains a point with an empty name".to_string());
            } else if !seen.insert(point.name.as_str()) {
                errors.push(format!("POINTS contains duplicate name '{}'", point.name));
            }
            if let Err(e) = validate_coordinates(point.latitude, point.longitude) {
                errors.push(format!("POINTS entry '{}': {}", point.name, e));
            }
        }
        if !self.points.iter().any(|p| p.name == self.default_point) {
            errors.push(format!(
                "DEFAULT_POINT '{}' is not one of the configured points",
                self.default_point
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }

    /// Stable hash over everything that changes what a fetch returns.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.air_quality_url.hash(&mut hasher);
        self.weather_url.hash(&mut hasher);
        for point in &self.points {
            point.name.hash(&mut hasher);
            point.latitude.to_bits().hash(&mut hasher);
            point.longitude.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            air_quality_url: self.air_quality_url.clone(),
            weather_url: self.weather_url.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            request_timeout: Duration::from_secs_f64(self.request_timeout_secs),
            base_delay: Duration::from_secs_f64(self.retry_delay_secs),
        }
    }

    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits::for_policy(self.max_concurrent_requests, &self.retry_policy())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            healthy_pm25: self.healthy_air_quality_threshold,
            hazardous_pm25: self.hazardous_air_quality_threshold,
            moderate_wind: self.moderate_wind_threshold,
            high_wind: self.high_wind_threshold,
            comfortable_temperature: self.comfortable_temperature_threshold,
            high_temperature: self.high_temperature_threshold,
        }
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.health_check_timeout_secs)
    }

    pub fn cache_duration(&self) -> chrono::Duration {
        let secs = self.cache_duration_secs.min(MAX_CACHE_DURATION_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    /// The point checked by health requests: the first configured one.
    pub fn health_point(&self) -> Option<&GeoPoint> {
        self.points.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "PORT",
        "AIR_QUALITY_URL",
        "WEATHER_URL",
        "REQUEST_TIMEOUT_SECS",
        "MAX_RETRIES",
        "RETRY_DELAY_SECS",
        "MAX_CONCURRENT_REQUESTS",
        "CONNECTION_POOL_SIZE",
        "CACHE_DURATION_SECS",
        "HEALTHY_AIR_QUALITY_THRESHOLD",
        "HAZARDOUS_AIR_QUALITY_THRESHOLD",
        "MODERATE_WIND_THRESHOLD",
        "HIGH_WIND_THRESHOLD",
        "COMFORTABLE_TEMPERATURE_THRESHOLD",
        "HIGH_TEMPERATURE_THRESHOLD",
        "HEALTH_CHECK_TIMEOUT_SECS",
        "POINTS",
        "DEFAULT_POINT",
    ];

    #[test]
    fn test_from_env() {
        // NOTE: set_var/remove_var in tests is unsafe in multi-threaded contexts
        // (Rust may run tests in parallel). Every env-dependent assertion lives
        // in this one test so no other test in the binary races on these vars.
        unsafe {
            for var in VARS {
                std::env::remove_var(var);
            }
        }

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.points.len(), 4);
        assert_eq!(config.default_point, "New Delhi");
        assert_eq!(config.air_quality_url, DEFAULT_AIR_QUALITY_URL);

        unsafe {
            std::env::set_var("PORT", "9090");
            std::env::set_var("MAX_RETRIES", "5");
            std::env::set_var("POINTS", "Pune:18.5204:73.8567; Chennai:13.0827:80.2707");
            std::env::set_var("DEFAULT_POINT", "Chennai");
        }
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.points[1].name, "Chennai");
        assert_eq!(config.default_point, "Chennai");

        unsafe {
            std::env::set_var("PORT", "not-a-port");
        }
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { name: "PORT", .. }));

        unsafe {
            std::env::remove_var("PORT");
            std::env::set_var("DEFAULT_POINT", "Kolkata");
        }
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("DEFAULT_POINT 'Kolkata'"));

        unsafe {
            for var in VARS {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = AppConfig {
            weather_url: "ftp://example.com".to_string(),
            hazardous_air_quality_threshold: 40.0,
            max_retries: 0,
            ..AppConfig::default()
        };
        let message = match config.validate() {
            Err(ConfigError::Invalid(m)) => m,
            other => panic!("expected Invalid, got {:?}", other),
        };
        assert!(message.contains("WEATHER_URL must start with"));
        assert!(message.contains("HAZARDOUS_AIR_QUALITY_THRESHOLD must be greater"));
        assert!(message.contains("MAX_RETRIES must be positive"));
        assert_eq!(message.matches("; ").count(), 2);
    }

    #[test]
    fn test_validate_caps_attempts() {
        let config = AppConfig {
            max_retries: u32::MAX,
            ..AppConfig::default()
        };
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("MAX_RETRIES must be at most 10"));

        let config = AppConfig {
            max_retries: 10,
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_threshold_ordering() {
        let config = AppConfig {
            high_wind_threshold: 20.0,
            high_temperature_threshold: 25.0,
            ..AppConfig::default()
        };
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("HIGH_WIND_THRESHOLD"));
        assert!(message.contains("HIGH_TEMPERATURE_THRESHOLD"));
    }

    #[test]
    fn test_validate_points() {
        let config = AppConfig {
            points: vec![
                GeoPoint::new("Mumbai", 19.0, 72.0),
                GeoPoint::new("Mumbai", 19.5, 72.5),
                GeoPoint::new("Nowhere", 95.0, 0.0),
            ],
            default_point: "Mumbai".to_string(),
            ..AppConfig::default()
        };
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("duplicate name 'Mumbai'"));
        assert!(message.contains("latitude 95"));
    }

    #[test]
    fn test_parse_points() {
        let points = parse_points("New Delhi:28.6139:77.2090;Mumbai:19.0760:72.8777;").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], GeoPoint::new("New Delhi", 28.6139, 77.209));
    }

    #[test]
    fn test_parse_points_rejects_bad_entries() {
        assert!(parse_points("Mumbai:19.0").is_err());
        assert!(parse_points("Mumbai:north:72.0").is_err());
    }

    #[test]
    fn test_fingerprint_tracks_points_and_urls() {
        let base = AppConfig::default();
        assert_eq!(base.fingerprint(), AppConfig::default().fingerprint());

        let moved = AppConfig {
            points: parse_points("New Delhi:28.7:77.2").unwrap(),
            ..AppConfig::default()
        };
        assert_ne!(base.fingerprint(), moved.fingerprint());

        // Thresholds do not change what is fetched
        let stricter = AppConfig {
            healthy_air_quality_threshold: 25.0,
            ..AppConfig::default()
        };
        assert_eq!(base.fingerprint(), stricter.fingerprint());
    }

    #[test]
    fn test_derived_settings() {
        let config = AppConfig::default();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.request_timeout, Duration::from_secs(10));
        assert_eq!(config.batch_limits().per_point_timeout, Duration::from_secs(33));
        assert_eq!(config.thresholds(), Thresholds::default());
        assert_eq!(config.health_point().unwrap().name, "New Delhi");
    }
}

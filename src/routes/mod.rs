pub mod dashboard;
pub mod health;
pub mod measurements;
pub mod points;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, ConfigError};
use crate::services::cache::MeasurementCache;
use crate::services::fetcher::Fetcher;
use crate::services::health::HealthChecker;
use crate::services::measurements::MeasurementService;
use crate::services::open_meteo::OpenMeteoClient;

/// Shared application state for all endpoints.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub measurements: Arc<MeasurementService<OpenMeteoClient>>,
    pub health: Arc<HealthChecker<OpenMeteoClient>>,
    /// Cancelled on process shutdown; every batch runs under a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Validate `config` and wire the services.
    pub fn new(
        config: AppConfig,
        client: OpenMeteoClient,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let health_point = config
            .health_point()
            .cloned()
            .ok_or_else(|| ConfigError::Invalid("POINTS must contain at least one point".to_string()))?;

        let fetcher = Arc::new(Fetcher::new(client, config.endpoints(), config.retry_policy()));
        let measurements = MeasurementService::new(
            Arc::clone(&fetcher),
            MeasurementCache::new(config.cache_duration()),
            config.points.clone(),
            config.batch_limits(),
            config.fingerprint(),
        );
        let health = HealthChecker::new(fetcher, health_point, config.health_check_timeout());

        Ok(Self {
            config: Arc::new(config),
            measurements: Arc::new(measurements),
            health: Arc::new(health),
            shutdown,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_requires_a_health_point() {
        let config = AppConfig {
            points: Vec::new(),
            ..AppConfig::default()
        };
        let result = AppState::new(config, OpenMeteoClient::new(1).unwrap(), CancellationToken::new());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}

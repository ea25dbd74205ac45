//! Upstream health checks.
//!
//! One request per endpoint for the health point, no retries, bounded by the
//! health-check timeout. The body must carry a `current` object to count as
//! healthy.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::errors::PipelineError;
use crate::models::GeoPoint;
use crate::services::fetcher::Fetcher;
use crate::services::open_meteo::{build_query, EndpointKind, Transport};

/// Result of probing one endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceHealth {
    pub service_name: String,
    pub is_healthy: bool,
    pub response_time_ms: f64,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Aggregate over all checked endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthSummary {
    pub overall_healthy: bool,
    pub total_services: usize,
    pub healthy_services: usize,
    pub unhealthy_services: usize,
    pub average_response_time_ms: f64,
    pub services: Vec<ServiceHealth>,
}

impl HealthSummary {
    pub fn from_results(services: Vec<ServiceHealth>) -> Self {
        let healthy_services = services.iter().filter(|s| s.is_healthy).count();
        let average_response_time_ms = if services.is_empty() {
            0.0
        } else {
            services.iter().map(|s| s.response_time_ms).sum::<f64>() / services.len() as f64
        };
        Self {
            overall_healthy: healthy_services == services.len(),
            total_services: services.len(),
            healthy_services,
            unhealthy_services: services.len() - healthy_services,
            average_response_time_ms,
            services,
        }
    }
}

pub struct HealthChecker<T> {
    fetcher: Arc<Fetcher<T>>,
    point: GeoPoint,
    timeout: Duration,
}

impl<T: Transport> HealthChecker<T> {
    /// Checks go through the fetcher's transport and endpoints.
    pub fn new(fetcher: Arc<Fetcher<T>>, point: GeoPoint, timeout: Duration) -> Self {
        Self {
            fetcher,
            point,
            timeout,
        }
    }

    pub async fn check_all(&self) -> HealthSummary {
        let (air_quality, weather) = futures::future::join(
            self.check(EndpointKind::AirQuality),
            self.check(EndpointKind::Weather),
        )
        .await;

        let summary = HealthSummary::from_results(vec![air_quality, weather]);
        if summary.overall_healthy {
            tracing::info!("All {} services are healthy", summary.total_services);
        } else {
            tracing::warn!(
                "{} of {} services are unhealthy",
                summary.unhealthy_services,
                summary.total_services
            );
        }
        summary
    }

    pub async fn check(&self, kind: EndpointKind) -> ServiceHealth {
        let checked_at = Utc::now();
        let started = Instant::now();
        let url = self.fetcher.endpoints().url(kind);
        let query = build_query(kind, self.point.latitude, self.point.longitude);

        let outcome = tokio::time::timeout(self.timeout, self.fetcher.transport().get_json(url, &query))
            .await
            .map_err(|_| PipelineError::Timeout(self.timeout))
            .and_then(|r| r)
            .and_then(|body| {
                if body.get("current").is_some_and(|c| c.is_object()) {
                    Ok(())
                } else {
                    Err(PipelineError::MalformedResponse(
                        "missing 'current' field".to_string(),
                    ))
                }
            });

        let response_time_ms = match &outcome {
            Err(PipelineError::Timeout(_)) => self.timeout.as_secs_f64() * 1000.0,
            _ => started.elapsed().as_secs_f64() * 1000.0,
        };

        let error = match outcome {
            Ok(()) => {
                tracing::info!(
                    "{} health check passed ({:.1}ms)",
                    kind.service_name(),
                    response_time_ms
                );
                None
            }
            Err(e) => {
                tracing::warn!("{} health check failed: {}", kind.service_name(), e);
                Some(e.to_string())
            }
        };

        ServiceHealth {
            service_name: kind.service_name().to_string(),
            is_healthy: error.is_none(),
            response_time_ms,
            error,
            checked_at,
        }
    }
}

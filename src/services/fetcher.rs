//! Retrying endpoint fetcher and per-point measurement assembly.
//!
//! Each logical request runs its own attempt loop with exponential backoff:
//! attempt `i` (0-based) that fails with a retryable error is followed by a
//! sleep of `base_delay * 2^i` before attempt `i + 1`. Sleeps only suspend the
//! calling task.

use std::time::Duration;

use chrono::Utc;

use crate::errors::PipelineError;
use crate::models::{GeoPoint, Measurement};
use crate::services::open_meteo::{
    build_query, parse_air_quality, parse_weather, AirQualityReading, EndpointKind, Endpoints,
    Transport, WeatherReading,
};
use crate::services::validator::validate_coordinates;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Attempt budget and timing for one logical request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub request_timeout: Duration,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Sleep before the attempt following failed attempt `attempt_index` (0-based).
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        2u32.checked_pow(attempt_index)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Worst-case wall time of one logical request: every attempt times out
    /// and every backoff is slept.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let backoff = (0..attempts - 1)
            .map(|i| self.backoff_delay(i))
            .fold(Duration::ZERO, Duration::saturating_add);
        self.request_timeout
            .saturating_mul(attempts)
            .saturating_add(backoff)
    }
}

/// Fetches endpoint readings and assembles validated measurements.
///
/// Holds the injected transport (and through it the shared connection pool);
/// no other state, so one instance is safely shared across concurrent tasks.
#[derive(Debug, Clone)]
pub struct Fetcher<T> {
    transport: T,
    endpoints: Endpoints,
    policy: RetryPolicy,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, endpoints: Endpoints, policy: RetryPolicy) -> Self {
        Self {
            transport,
            endpoints,
            policy,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Issue one logical request against `kind` and parse its body with `parse`.
    ///
    /// Invalid coordinates fail immediately without consuming an attempt.
    /// Retryable failures (network, timeout, HTTP status, malformed body,
    /// including a body `parse` rejects) are retried up to
    /// `policy.max_attempts`; after that the last error is returned wrapped in
    /// `FetchExhausted`. Non-retryable failures are returned as-is.
    pub async fn fetch<R, F>(
        &self,
        kind: EndpointKind,
        lat: f64,
        lon: f64,
        parse: F,
    ) -> Result<R, PipelineError>
    where
        F: Fn(&serde_json::Value) -> Result<R, PipelineError>,
    {
        validate_coordinates(lat, lon)?;

        let url = self.endpoints.url(kind);
        let query = build_query(kind, lat, lon);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            tracing::debug!(
                "Fetching {:?} for ({}, {}), attempt {}/{}",
                kind,
                lat,
                lon,
                attempt + 1,
                max_attempts
            );

            let result = match tokio::time::timeout(
                self.policy.request_timeout,
                self.transport.get_json(url, &query),
            )
            .await
            {
                Ok(Ok(body)) => parse(&body),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(PipelineError::Timeout(self.policy.request_timeout)),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            attempt += 1;
            tracing::warn!(
                "{:?} attempt {}/{} for ({}, {}) failed: {}",
                kind,
                attempt,
                max_attempts,
                lat,
                lon,
                err
            );

            if attempt >= max_attempts {
                tracing::error!(
                    "All {} {:?} attempts failed for ({}, {}). Last error: {}",
                    max_attempts,
                    kind,
                    lat,
                    lon,
                    err
                );
                return Err(PipelineError::FetchExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.backoff_delay(attempt - 1);
            tracing::debug!("Retrying {:?} in {:?}", kind, delay);
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn fetch_air_quality(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<AirQualityReading, PipelineError> {
        self.fetch(EndpointKind::AirQuality, lat, lon, parse_air_quality)
            .await
    }

    pub async fn fetch_weather(&self, lat: f64, lon: f64) -> Result<WeatherReading, PipelineError> {
        self.fetch(EndpointKind::Weather, lat, lon, parse_weather)
            .await
    }

    /// Fetch both endpoints for `point` and assemble a validated measurement.
    ///
    /// The two calls run concurrently with independent retry budgets; the
    /// first terminal failure drops the other call. Out-of-range values fail
    /// the point with `InvalidMeasurement`.
    pub async fn fetch_point(&self, point: &GeoPoint) -> Result<Measurement, PipelineError> {
        validate_coordinates(point.latitude, point.longitude)?;

        let (air, weather) = futures::future::try_join(
            self.fetch_air_quality(point.latitude, point.longitude),
            self.fetch_weather(point.latitude, point.longitude),
        )
        .await?;

        let measurement = Measurement::try_new(
            point.clone(),
            air.pm25,
            weather.temperature,
            weather.wind_speed,
            weather.precipitation,
            Utc::now(),
        )?;

        tracing::info!(
            "Fetched {}: PM2.5={} μg/m³, Temperature={}°C, Wind={} km/h, Precipitation={} mm",
            point.name,
            air.pm25,
            weather.temperature,
            weather.wind_speed,
            weather.precipitation
        );

        Ok(measurement)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn fetcher(transport: ScriptedTransport) -> Fetcher<ScriptedTransport> {
        Fetcher::new(transport, endpoints(), RetryPolicy::default())
    }

    #[test]
    fn test_backoff_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(200), Duration::MAX);
    }

    #[test]
    fn test_worst_case_duration() {
        // 3 × 10s timeouts + 1s + 2s backoff
        assert_eq!(RetryPolicy::default().worst_case(), Duration::from_secs(33));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success_sleeps_exponentially() {
        let transport = ScriptedTransport::new();
        transport.script(
            AQ_URL,
            10.0,
            vec![
                Reply::Fail(network_error),
                Reply::Fail(server_error),
                Reply::Json(aq_body(40.0)),
            ],
        );
        let fetcher = fetcher(transport.clone());

        let reading = assert_ok!(fetcher.fetch_air_quality(10.0, 20.0).await);
        assert_eq!(reading.pm25, 40.0);

        let calls = transport.calls_to(AQ_URL);
        assert_eq!(calls.len(), 3, "k=2 failures → k+1 attempts");
        assert_eq!(calls[1] - calls[0], Duration::from_secs(1));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_makes_exactly_max_attempts() {
        let transport = ScriptedTransport::new();
        transport.script(WX_URL, 10.0, vec![Reply::Fail(server_error)]);
        let fetcher = fetcher(transport.clone());

        let err = assert_err!(fetcher.fetch_weather(10.0, 20.0).await);
        match err {
            PipelineError::FetchExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, PipelineError::Http { status: 500 }));
            }
            other => panic!("expected FetchExhausted, got {:?}", other),
        }
        let calls = transport.calls_to(WX_URL);
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(1));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body_is_retried() {
        let transport = ScriptedTransport::new();
        transport.script(
            AQ_URL,
            10.0,
            vec![
                Reply::Json(serde_json::json!({ "current": { "pm2_5": null } })),
                Reply::Json(aq_body(12.5)),
            ],
        );
        let fetcher = fetcher(transport.clone());

        let reading = assert_ok!(fetcher.fetch_air_quality(10.0, 20.0).await);
        assert_eq!(reading.pm25, 12.5);
        assert_eq!(transport.calls_to(AQ_URL).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_is_retried() {
        let transport = ScriptedTransport::new();
        transport.script(
            AQ_URL,
            10.0,
            vec![Reply::Hang, Reply::Json(aq_body(8.0))],
        );
        let fetcher = fetcher(transport.clone());

        let reading = assert_ok!(fetcher.fetch_air_quality(10.0, 20.0).await);
        assert_eq!(reading.pm25, 8.0);

        let calls = transport.calls_to(AQ_URL);
        // 10s timeout + 1s backoff
        assert_eq!(calls[1] - calls[0], Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_invalid_coordinates_issue_no_requests() {
        let transport = ScriptedTransport::new();
        let fetcher = fetcher(transport.clone());

        for (lat, lon) in [(91.0, 0.0), (-90.1, 0.0), (0.0, 180.5), (0.0, -181.0)] {
            let point = GeoPoint::new("Nowhere", lat, lon);
            let err = assert_err!(fetcher.fetch_point(&point).await);
            assert!(matches!(err, PipelineError::InvalidCoordinate(_)));
        }
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_non_retryable_transport_error_not_retried() {
        let transport = ScriptedTransport::new();
        transport.script(
            AQ_URL,
            10.0,
            vec![Reply::Fail(|| PipelineError::InvalidCoordinate("rejected".into()))],
        );
        let fetcher = fetcher(transport.clone());

        let err = assert_err!(fetcher.fetch_air_quality(10.0, 20.0).await);
        assert!(matches!(err, PipelineError::InvalidCoordinate(_)));
        assert_eq!(transport.calls_to(AQ_URL).len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_point_assembles_measurement() {
        let transport = ScriptedTransport::new();
        transport.healthy_point(19.076, 62.0, 29.5, 11.0, 0.2);
        let fetcher = fetcher(transport.clone());

        let before = Utc::now();
        let point = GeoPoint::new("Mumbai", 19.076, 72.8777);
        let m = assert_ok!(fetcher.fetch_point(&point).await);
        assert_eq!(m.point_name(), "Mumbai");
        assert_eq!(m.pm25(), 62.0);
        assert_eq!(m.temperature(), 29.5);
        assert_eq!(m.wind_speed(), 11.0);
        assert_eq!(m.precipitation(), 0.2);
        assert_eq!(m.coordinates(), &point);
        assert!(m.fetched_at() >= before);
    }

    #[tokio::test]
    async fn test_fetch_point_implausible_value_fails_without_retry() {
        let transport = ScriptedTransport::new();
        transport.healthy_point(19.076, 62.0, 75.0, 11.0, 0.0);
        let fetcher = fetcher(transport.clone());

        let err = assert_err!(
            fetcher
                .fetch_point(&GeoPoint::new("Mumbai", 19.076, 72.8777))
                .await
        );
        assert!(matches!(
            err,
            PipelineError::InvalidMeasurement {
                field: "temperature",
                ..
            }
        ));
        assert_eq!(transport.calls_to(AQ_URL).len(), 1);
        assert_eq!(transport.calls_to(WX_URL).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoint_retry_budgets_are_independent() {
        let transport = ScriptedTransport::new();
        transport.script(AQ_URL, 12.97, vec![Reply::Json(aq_body(20.0))]);
        transport.script(
            WX_URL,
            12.97,
            vec![
                Reply::Fail(network_error),
                Reply::Fail(network_error),
                Reply::Json(wx_body(24.0, 8.0, 0.0)),
            ],
        );
        let fetcher = fetcher(transport.clone());

        let m = assert_ok!(
            fetcher
                .fetch_point(&GeoPoint::new("Bengaluru", 12.97, 77.59))
                .await
        );
        assert_eq!(m.temperature(), 24.0);
        // Weather retries do not re-issue the air-quality request
        assert_eq!(transport.calls_to(AQ_URL).len(), 1);
        assert_eq!(transport.calls_to(WX_URL).len(), 3);
    }
}

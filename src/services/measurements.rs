//! Measurement resolution: serve the cached batch while fresh, otherwise run
//! the orchestrator under an outer deadline and cache the result.
//!
//! Refreshes are serialized: concurrent requests that find the cache cold
//! wait for the one batch in flight and then read its result from the cache.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::errors::PipelineError;
use crate::models::{GeoPoint, Measurement};
use crate::services::cache::MeasurementCache;
use crate::services::fetcher::Fetcher;
use crate::services::open_meteo::Transport;
use crate::services::orchestrator::{fetch_all, BatchLimits};

/// Slack on top of the computed batch deadline for scheduling overhead.
const BATCH_DEADLINE_SLACK: Duration = Duration::from_secs(5);

pub struct MeasurementService<T> {
    fetcher: Arc<Fetcher<T>>,
    cache: MeasurementCache,
    points: Vec<GeoPoint>,
    limits: BatchLimits,
    fingerprint: u64,
    /// Held for the whole duration of one batch fetch.
    refresh_lock: Mutex<()>,
}

impl<T: Transport + 'static> MeasurementService<T> {
    pub fn new(
        fetcher: Arc<Fetcher<T>>,
        cache: MeasurementCache,
        points: Vec<GeoPoint>,
        limits: BatchLimits,
        fingerprint: u64,
    ) -> Self {
        Self {
            fetcher,
            cache,
            points,
            limits,
            fingerprint,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// Outer deadline for one batch: every queued wave of points gets its
    /// full per-point timeout.
    pub fn batch_deadline(&self) -> Duration {
        let limit = self.limits.concurrency_limit.max(1);
        let waves = u32::try_from(self.points.len().div_ceil(limit)).unwrap_or(u32::MAX);
        self.limits
            .per_point_timeout
            .saturating_mul(waves.max(1))
            .saturating_add(BATCH_DEADLINE_SLACK)
    }

    /// Sorted measurements for every configured point.
    pub async fn current(&self, cancel: &CancellationToken) -> Result<Vec<Measurement>, PipelineError> {
        if let Some(cached) = self.cache.lookup(self.fingerprint, Utc::now()).await {
            return Ok(cached);
        }

        let _refresh = self.lock_refresh(cancel).await?;
        // Another request may have refreshed while this one waited
        if let Some(cached) = self.cache.lookup(self.fingerprint, Utc::now()).await {
            return Ok(cached);
        }
        self.fetch_and_store(cancel).await
    }

    /// Fetch a new batch regardless of the cache. Only a successful batch
    /// replaces the cached one.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<Vec<Measurement>, PipelineError> {
        let _refresh = self.lock_refresh(cancel).await?;
        self.fetch_and_store(cancel).await
    }

    async fn lock_refresh(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, ()>, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            guard = self.refresh_lock.lock() => Ok(guard),
        }
    }

    async fn fetch_and_store(&self, cancel: &CancellationToken) -> Result<Vec<Measurement>, PipelineError> {
        let deadline = self.batch_deadline();
        let batch = fetch_all(Arc::clone(&self.fetcher), &self.points, self.limits, cancel);

        let measurements = match tokio::time::timeout(deadline, batch).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!("Measurement batch exceeded its {:?} deadline", deadline);
                return Err(PipelineError::Timeout(deadline));
            }
        };

        self.cache
            .store(self.fingerprint, Utc::now(), measurements.clone())
            .await;
        Ok(measurements)
    }
}

//! In-memory cache of the last successful measurement batch.
//!
//! A cached batch is served only while it is younger than the cache duration
//! and was fetched under the same configuration fingerprint. Failed batches
//! never reach the cache; the orchestrator is all-or-nothing.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::Measurement;

#[derive(Debug, Clone)]
struct CachedBatch {
    fingerprint: u64,
    fetched_at: DateTime<Utc>,
    measurements: Vec<Measurement>,
}

/// Shared cache handle. Cloning shares the same slot.
#[derive(Debug, Clone)]
pub struct MeasurementCache {
    inner: Arc<RwLock<Option<CachedBatch>>>,
    ttl: Duration,
}

impl MeasurementCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            ttl,
        }
    }

    /// The cached batch, if fresh at `now` and fetched under `fingerprint`.
    pub async fn lookup(&self, fingerprint: u64, now: DateTime<Utc>) -> Option<Vec<Measurement>> {
        let slot = self.inner.read().await;
        let batch = slot.as_ref()?;

        if batch.fingerprint != fingerprint {
            tracing::debug!("Cache miss: configuration changed");
            return None;
        }
        let age = now - batch.fetched_at;
        if age >= self.ttl {
            tracing::debug!("Cache miss: batch is {}s old", age.num_seconds());
            return None;
        }

        tracing::debug!(
            "Cache hit: {} measurements, {}s old",
            batch.measurements.len(),
            age.num_seconds()
        );
        Some(batch.measurements.clone())
    }

    /// Replace the cached batch.
    pub async fn store(&self, fingerprint: u64, fetched_at: DateTime<Utc>, measurements: Vec<Measurement>) {
        let mut slot = self.inner.write().await;
        *slot = Some(CachedBatch {
            fingerprint,
            fetched_at,
            measurements,
        });
    }

    pub async fn invalidate(&self) {
        let mut slot = self.inner.write().await;
        if slot.take().is_some() {
            tracing::info!("Measurement cache invalidated");
        }
    }

    /// Fetch time of the cached batch, if any.
    pub async fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.as_ref().map(|b| b.fetched_at)
    }
}

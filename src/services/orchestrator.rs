//! Concurrent multi-point fetch orchestration.
//!
//! Architecture:
//! - One task per point in a `JoinSet`, gated by a `Semaphore` so at most
//!   `concurrency_limit` point fetches are in flight; the rest queue.
//! - Each task has its own deadline (`per_point_timeout`), measured from the
//!   moment it gets a permit.
//! - All-or-nothing: the first terminal failure cancels the batch token,
//!   aborts every sibling and waits for them to unwind, then returns that
//!   failure only.
//! - The caller's `CancellationToken` is the parent of the batch token, so
//!   cancelling the caller (or dropping the future) stops all tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::errors::PipelineError;
use crate::models::{GeoPoint, Measurement};
use crate::services::fetcher::{Fetcher, RetryPolicy};
use crate::services::open_meteo::Transport;

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

/// Bounds applied to one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchLimits {
    pub concurrency_limit: usize,
    pub per_point_timeout: Duration,
}

impl BatchLimits {
    /// Limits whose per-point deadline covers the worst case of `policy`.
    pub fn for_policy(concurrency_limit: usize, policy: &RetryPolicy) -> Self {
        Self {
            concurrency_limit,
            per_point_timeout: policy.worst_case(),
        }
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self::for_policy(DEFAULT_CONCURRENCY_LIMIT, &RetryPolicy::default())
    }
}

/// Result of one point task, before the batch-level decision.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(Measurement),
    Failure {
        point_name: String,
        error: PipelineError,
    },
}

impl FetchOutcome {
    fn from_result(point_name: String, result: Result<Measurement, PipelineError>) -> Self {
        match result {
            Ok(m) => FetchOutcome::Success(m),
            Err(error) => FetchOutcome::Failure { point_name, error },
        }
    }
}

/// Fetch every point concurrently and return measurements sorted by name.
///
/// Fails with `PointFailed` naming the first point whose fetch failed
/// terminally, or `Cancelled` if `cancel` fires first. No partial results.
pub async fn fetch_all<T>(
    fetcher: Arc<Fetcher<T>>,
    points: &[GeoPoint],
    limits: BatchLimits,
    cancel: &CancellationToken,
) -> Result<Vec<Measurement>, PipelineError>
where
    T: Transport + 'static,
{
    if points.is_empty() {
        return Ok(Vec::new());
    }

    let started = tokio::time::Instant::now();
    let semaphore = Arc::new(Semaphore::new(limits.concurrency_limit.max(1)));
    let batch_token = cancel.child_token();
    // Cancels the batch token on every exit path, including drop of this future
    let _batch_guard = batch_token.clone().drop_guard();
    let mut tasks = JoinSet::new();

    for point in points.iter().cloned() {
        let fetcher = Arc::clone(&fetcher);
        let semaphore = Arc::clone(&semaphore);
        let token = batch_token.clone();
        let timeout = limits.per_point_timeout;

        tasks.spawn(async move {
            let name = point.name.clone();
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(PipelineError::Cancelled),
                result = fetch_with_permit(&fetcher, &point, &semaphore, timeout) => result,
            };
            FetchOutcome::from_result(name, result)
        });
    }

    let mut measurements = Vec::with_capacity(points.len());

    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Batch fetch cancelled with {} task(s) in flight", tasks.len());
                tasks.shutdown().await;
                return Err(PipelineError::Cancelled);
            }
            joined = tasks.join_next() => joined,
        };

        let outcome = match joined {
            None => break,
            Some(Ok(outcome)) => outcome,
            Some(Err(join_err)) => {
                batch_token.cancel();
                tasks.shutdown().await;
                return Err(PipelineError::TaskFailed(join_err.to_string()));
            }
        };

        match outcome {
            FetchOutcome::Success(m) => {
                tracing::debug!("Point {} fetched", m.point_name());
                measurements.push(m);
            }
            FetchOutcome::Failure { point_name, error } => {
                batch_token.cancel();
                tasks.shutdown().await;
                tracing::error!(
                    "Failed to fetch data for {}: {}; discarding {} completed point(s)",
                    point_name,
                    error,
                    measurements.len()
                );
                return Err(PipelineError::PointFailed {
                    point: point_name,
                    source: Box::new(error),
                });
            }
        }
    }

    measurements.sort_by(|a, b| a.point_name().cmp(b.point_name()));

    tracing::info!(
        "Fetched data for {} points concurrently in {}ms",
        measurements.len(),
        started.elapsed().as_millis()
    );

    Ok(measurements)
}

async fn fetch_with_permit<T: Transport>(
    fetcher: &Fetcher<T>,
    point: &GeoPoint,
    semaphore: &Semaphore,
    timeout: Duration,
) -> Result<Measurement, PipelineError> {
    // Held until the fetch completes or the task is dropped
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|_| PipelineError::Cancelled)?;

    match tokio::time::timeout(timeout, fetcher.fetch_point(point)).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout(timeout)),
    }
}

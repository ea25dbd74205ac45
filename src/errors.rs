use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Error category: "timeout", "connectivity", "service_error" or "invalid_request"
    pub category: String,
    /// Whether the client may reasonably retry the same request
    pub retryable: bool,
}

/// Errors produced by the acquisition → validation → decision pipeline.
///
/// Each variant is either retryable (a transient upstream fault the fetcher's
/// retry loop may recover from) or terminal. See [`PipelineError::is_retryable`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid measurement: {field} = {value} violates {bound}")]
    InvalidMeasurement {
        field: &'static str,
        value: f64,
        bound: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream returned HTTP {status}")]
    Http { status: u16 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Fetch failed after {attempts} attempts: {last}")]
    FetchExhausted {
        attempts: u32,
        last: Box<PipelineError>,
    },

    #[error("Fetch failed for point '{point}': {source}")]
    PointFailed {
        point: String,
        source: Box<PipelineError>,
    },

    #[error("Point not found: {0}")]
    PointNotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Fetch task failed: {0}")]
    TaskFailed(String),
}

/// User-facing failure category, derived from the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Timeout,
    Connectivity,
    ServiceError,
    InvalidRequest,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::ServiceError => "service_error",
            ErrorCategory::InvalidRequest => "invalid_request",
        }
    }

    /// Message safe to show an end user; never includes upstream error text.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Timeout => {
                "The air-quality service took too long to respond. Please try again."
            }
            ErrorCategory::Connectivity => {
                "Could not reach the air-quality service. Check your connection and try again."
            }
            ErrorCategory::ServiceError => {
                "The air-quality service returned an unexpected response. Please try again later."
            }
            ErrorCategory::InvalidRequest => "The request could not be processed.",
        }
    }
}

impl PipelineError {
    /// Transient faults the fetcher's retry loop may recover from.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Network(_)
                | PipelineError::Timeout(_)
                | PipelineError::Http { .. }
                | PipelineError::MalformedResponse(_)
        )
    }

    /// The innermost cause, unwrapping `PointFailed` and `FetchExhausted`.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::PointFailed { source, .. } => source.root_cause(),
            PipelineError::FetchExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.root_cause() {
            PipelineError::Timeout(_) | PipelineError::Cancelled => ErrorCategory::Timeout,
            PipelineError::Network(_) => ErrorCategory::Connectivity,
            PipelineError::Http { .. }
            | PipelineError::MalformedResponse(_)
            | PipelineError::InvalidMeasurement { .. }
            | PipelineError::TaskFailed(_) => ErrorCategory::ServiceError,
            PipelineError::InvalidCoordinate(_) | PipelineError::PointNotFound(_) => {
                ErrorCategory::InvalidRequest
            }
            // root_cause never returns a wrapper
            PipelineError::FetchExhausted { .. } | PipelineError::PointFailed { .. } => {
                ErrorCategory::ServiceError
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Pipeline error: {0}")]
    Pipeline(PipelineError),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::PointNotFound(name) => AppError::NotFound(name),
            other => AppError::Pipeline(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(name) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: format!("Unknown point '{}'", name),
                    category: ErrorCategory::InvalidRequest.as_str().to_string(),
                    retryable: false,
                },
            ),
            AppError::Pipeline(err) => {
                tracing::error!("Pipeline error: {}", err);
                let category = err.category();
                let status = match category {
                    ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    ErrorCategory::Connectivity | ErrorCategory::ServiceError => {
                        StatusCode::BAD_GATEWAY
                    }
                    ErrorCategory::InvalidRequest => StatusCode::BAD_REQUEST,
                };
                (
                    status,
                    ErrorResponse {
                        error: category.user_message().to_string(),
                        category: category.as_str().to_string(),
                        retryable: category != ErrorCategory::InvalidRequest,
                    },
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

//! Common types and utilities for API endpoints.

use std::error::Error;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SchedulerMode;
use crate::scheduler::ScheduleError;

/// Error type for API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Errors indicating malformed or illegal requests.
    #[error("client error: {0}")]
    Client(String),

    /// The simulated query was interrupted because the server is shutting down.
    #[error("request cancelled")]
    Cancelled,

    /// Server errors, indicating that something went wrong when executing a request.
    #[error("server error: {0}")]
    Server(#[source] Box<dyn Error + Send + Sync>),
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Simulation(querysim_service::Error::Cancelled) => ApiError::Cancelled,
            other => ApiError::Server(Box::new(other)),
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// A JSON error response returned by the API.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiErrorResponse {
    /// The main error message.
    #[serde(default)]
    pub detail: Option<String>,
    /// Chain of error causes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ApiErrorResponse {
    /// Creates an error response from an error, extracting the full cause chain.
    pub fn from_error<E: Error + ?Sized>(error: &E) -> Self {
        let detail = Some(error.to_string());

        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(s) = source {
            causes.push(s.to_string());
            source = s.source();
        }

        Self { detail, causes }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Client(_) => StatusCode::BAD_REQUEST,
            ApiError::Cancelled => {
                tracing::debug!("simulated query cancelled");
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Server(_) => {
                tracing::error!(error = &self as &dyn Error, "error handling request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ApiErrorResponse::from_error(&self);
        (status, Json(body)).into_response()
    }
}

/// The JSON envelope of every successful API response.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    /// A human readable summary.
    pub message: String,
    /// The endpoint specific payload.
    pub data: T,
    /// Name of the thread that executed the request.
    pub thread_name: String,
    /// The scheduling backend serving the request.
    pub scheduler: SchedulerMode,
    /// Milliseconds since the UNIX epoch at which the response was created.
    pub timestamp: u64,
}

impl<T> ApiResponse<T> {
    /// Creates a response executed on `thread_name`.
    pub fn new(
        message: impl Into<String>,
        data: T,
        thread_name: String,
        scheduler: SchedulerMode,
    ) -> Self {
        Self {
            message: message.into(),
            data,
            thread_name,
            scheduler,
            timestamp: unix_millis(SystemTime::now()),
        }
    }

    /// Creates a response produced on the current thread.
    pub fn here(message: impl Into<String>, data: T, scheduler: SchedulerMode) -> Self {
        let thread_name = thread::current().name().unwrap_or("unnamed").to_owned();
        Self::new(message, data, thread_name, scheduler)
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

/// Converts a duration into fractional milliseconds for API responses.
pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

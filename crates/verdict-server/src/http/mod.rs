pub mod models;
mod routes;

pub use routes::create_router;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use verdict_core::{ModelRegistry, Orchestrator, VerdictError};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    /// Upper bound on a single evaluate call.
    pub eval_timeout: Duration,
    /// Maximum accepted request body (model uploads and batches).
    pub max_body_size: usize,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, eval_timeout: Duration, max_body_size: usize) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(registry.clone())),
            registry,
            eval_timeout,
            max_body_size,
            start_time: std::time::Instant::now(),
        }
    }
}

/// JSON response wrapper
#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Raised when an evaluate call outlives `AppState::eval_timeout`.
#[derive(Debug)]
pub struct EvaluationTimeout(pub Duration);

impl std::fmt::Display for EvaluationTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evaluation timed out after {}ms", self.0.as_millis())
    }
}

impl std::error::Error for EvaluationTimeout {}

/// Custom error type for HTTP handlers
pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if self.0.is::<EvaluationTimeout>() {
            return StatusCode::GATEWAY_TIMEOUT;
        }
        match self.0.downcast_ref::<VerdictError>() {
            Some(VerdictError::ModelNotFound { .. } | VerdictError::VersionNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            Some(VerdictError::Conflict { .. } | VerdictError::VersionsExhausted { .. }) => {
                StatusCode::CONFLICT
            }
            Some(VerdictError::Parse(_) | VerdictError::Validation { .. }) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(JsonResponse::<()>::err(self.0.to_string()))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

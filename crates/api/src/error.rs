//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use customer::CustomerError;
use saga::{FailureKind, SagaError, SagaResult, SagaStatus};
use serde_json::json;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// The command could not be turned into a saga execution.
    #[error(transparent)]
    Customer(#[from] CustomerError),

    /// The saga ran and did not complete.
    #[error("saga {} {}", .0.saga, .0.status)]
    SagaFailed(Box<SagaResult>),
}

impl From<SagaResult> for ApiError {
    fn from(result: SagaResult) -> Self {
        ApiError::SagaFailed(Box::new(result))
    }
}

/// HTTP status for a saga outcome.
///
/// A compensated failure maps by its cause; a failure whose rollback did
/// not finish is always a server error.
pub fn status_for(result: &SagaResult) -> StatusCode {
    match result.status {
        SagaStatus::Completed => StatusCode::OK,
        SagaStatus::CompensationIncomplete => StatusCode::INTERNAL_SERVER_ERROR,
        SagaStatus::Failed => match result.failure.as_ref().map(|f| f.kind()) {
            Some(FailureKind::Conflict) => StatusCode::CONFLICT,
            Some(FailureKind::NotFound) => StatusCode::NOT_FOUND,
            Some(FailureKind::InvalidInput) => StatusCode::BAD_REQUEST,
            Some(FailureKind::Unavailable | FailureKind::Timeout | FailureKind::Cancelled) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Some(FailureKind::Internal) | None => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn customer_error_status(err: &CustomerError) -> StatusCode {
    match err {
        CustomerError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        CustomerError::Saga(SagaError::InputSerialization { .. }) => StatusCode::BAD_REQUEST,
        CustomerError::Saga(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn saga_failure_body(result: &SagaResult) -> serde_json::Value {
    let message = result
        .failure
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("saga {} did not complete", result.saga));
    json!({
        "error": message,
        "saga": result.saga,
        "executionId": result.execution_id,
        "status": result.status.as_str(),
        "failedStep": result.failure.as_ref().map(|f| f.step.clone()),
        "compensated": result.compensated(),
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Customer(err) => {
                let status = customer_error_status(&err);
                if status.is_server_error() {
                    tracing::error!(error = %err, "customer command could not be started");
                }
                (status, json!({ "error": err.to_string() }))
            }
            ApiError::SagaFailed(result) => {
                if result.status == SagaStatus::CompensationIncomplete {
                    let failed: Vec<String> = result
                        .compensation_errors()
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    tracing::error!(
                        saga = %result.saga,
                        execution_id = %result.execution_id,
                        failed_compensations = ?failed,
                        "Saga rollback incomplete, data inconsistency requires operator action"
                    );
                }
                (status_for(&result), saga_failure_body(&result))
            }
        };

        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string())
            .increment(1);
        (status, Json(body)).into_response()
    }
}

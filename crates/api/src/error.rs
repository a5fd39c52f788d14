//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ValidationErrors};
use statistics::StatisticsError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The caller could not be identified.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Field-level validation failures.
    Validation(ValidationErrors),
    /// Domain logic error.
    Domain(DomainError),
    /// Statistics aggregation error.
    Statistics(StatisticsError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self {
            ApiError::Unauthorized(msg) => error_body(StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::Validation(errors) => validation_body(errors),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Statistics(err) => {
                tracing::error!(error = %err, "statistics failed");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to load statistics".to_string(),
                )
            }
        };
        body.into_response()
    }
}

type ErrorBody = (StatusCode, axum::Json<serde_json::Value>);

fn error_body(status: StatusCode, message: String) -> ErrorBody {
    (status, axum::Json(serde_json::json!({ "error": message })))
}

fn validation_body(errors: ValidationErrors) -> ErrorBody {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(serde_json::json!({
            "error": "Validation failed",
            "errors": errors,
        })),
    )
}

fn domain_error_to_response(err: DomainError) -> ErrorBody {
    match err {
        DomainError::Validation(errors) => validation_body(errors),
        DomainError::NotFound { .. } => error_body(StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Conflict { ref field } => (
            StatusCode::CONFLICT,
            axum::Json(serde_json::json!({
                "error": err.to_string(),
                "field": field,
            })),
        ),
        DomainError::InsufficientStock { .. } | DomainError::InUse { .. } => {
            error_body(StatusCode::CONFLICT, err.to_string())
        }
        DomainError::Transaction { ref operation, .. } => {
            tracing::error!(error = %err, "transaction failed");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {operation}"),
            )
        }
        DomainError::Store(_) => {
            tracing::error!(error = %err, "store error");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<StatisticsError> for ApiError {
    fn from(err: StatisticsError) -> Self {
        ApiError::Statistics(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

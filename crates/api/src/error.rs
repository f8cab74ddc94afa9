//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use outbox::ServiceError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Service-layer error.
    Service(ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Service(err) => service_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn service_error_to_response(err: ServiceError) -> (StatusCode, String) {
    match &err {
        ServiceError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::InvalidOrderState { .. } => (StatusCode::CONFLICT, err.to_string()),
        ServiceError::Order(order_err) => match order_err {
            OrderError::InvalidTransition { .. } | OrderError::CannotCancel { .. } => {
                (StatusCode::CONFLICT, err.to_string())
            }
            OrderError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            OrderError::UnknownState(_) => internal(&err),
        },
        // Infrastructure details never reach the client.
        ServiceError::Outbox(_)
        | ServiceError::Store(_)
        | ServiceError::Channel(_)
        | ServiceError::Gateway(_) => internal(&err),
    }
}

fn internal(err: &ServiceError) -> (StatusCode, String) {
    tracing::error!(error = %err, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

//! Error types for als-sr

use als_common::api::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// als-common error; status depends on the kind
    #[error(transparent)]
    Common(#[from] als_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use als_common::Error as CommonError;

        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => match err {
                CommonError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
                CommonError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
                CommonError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                CommonError::DataCompleteness(msg) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATA_COMPLETENESS",
                    msg,
                ),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    other.to_string(),
                ),
            },
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        (status, Json(ErrorResponse::new(error_code, message))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::from(als_common::Error::Validation("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(als_common::Error::DataCompleteness("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(als_common::Error::NotFound("x".into())),
                StatusCode::NOT_FOUND,
            ),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}

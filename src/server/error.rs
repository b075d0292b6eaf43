//! HTTP error responses
//!
//! Client errors carry their message as `{"error": "..."}`. Anything else is
//! logged and answered with a generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::Error;

/// Error returned by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(message) => ApiError::BadRequest(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ApiError::BadRequest(error) => {
                tracing::debug!(error = %error, "Rejected request");
                (status, Json(ErrorBody { error })).into_response()
            }
            ApiError::Unavailable(error) => {
                tracing::warn!(error = %error, "Service unavailable");
                (status, Json(ErrorBody { error })).into_response()
            }
            ApiError::Internal(error) => {
                tracing::error!(error = %error, "Request failed");
                (status, "Something bad happened.").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn test_invalid_input_is_bad_request() {
        let err = ApiError::from(Error::invalid_input("Auth is not provided"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Auth is not provided");
    }

    #[test]
    fn test_other_errors_are_internal() {
        let err = ApiError::from(Error::Transport(TransportError::Closed));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unavailable_response_status() {
        let response = ApiError::Unavailable("limit".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

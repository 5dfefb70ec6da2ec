//! API error types
//!
//! Every JSON action answers `{"success":false,"error":"..."}` on failure.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use natswatch_core::CoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected before touching the broker.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The broker could not be reached or refused the operation.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        if err.is_invalid_request() {
            Self::BadRequest(message)
        } else if err.is_not_found() {
            Self::NotFound(message)
        } else {
            match err {
                CoreError::Connection { .. }
                | CoreError::ResourceCreation { .. }
                | CoreError::Broker { .. } => Self::Upstream(message),
                _ => Self::Internal(message),
            }
        }
    }
}

/// Failure body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %body.error, "API request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %body.error, "API request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// Success body: `{"success":true,"data":...}`.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<Success<T>>, ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Success {
        success: true,
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (CoreError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::ClusterNotFound { id: "c".into() }, StatusCode::BAD_REQUEST),
            (
                CoreError::NotFound {
                    entity: "Stream".into(),
                    identifier: "ORDERS".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                CoreError::Connection {
                    cluster: "a".into(),
                    reason: "refused".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (CoreError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn message_is_passed_through() {
        let err = ApiError::from(CoreError::ClusterNotFound { id: "nope".into() });
        assert_eq!(err.to_string(), "Cluster nope not found");
    }
}

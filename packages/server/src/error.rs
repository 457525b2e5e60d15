use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::session::SessionError;
use common::storage::StorageError;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`,
    /// `IDENTITY_MISSING`, `NOT_FOUND`, `PAYLOAD_TOO_LARGE`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "chunk number must be >= 1, got 0")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    IdentityMissing,
    NotFound(String),
    /// Body over the size limit. Carries the limit in bytes.
    PayloadTooLarge(u64),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::IdentityMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "IDENTITY_MISSING",
                    message: "X-User-Id header is required".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody {
                    code: "PAYLOAD_TOO_LARGE",
                    message: format!("Body exceeds the limit of {limit} bytes"),
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidArgument(msg) => AppError::Validation(msg),
            SessionError::NotFound(id) => {
                AppError::NotFound(format!("Session metadata not found for {id}"))
            }
            SessionError::Store(e) => e.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            StorageError::SizeLimitExceeded { limit, .. } => AppError::PayloadTooLarge(limit),
            other => AppError::Internal(other.to_string()),
        }
    }
}

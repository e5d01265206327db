use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use storage::StorageError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    #[schema(example = false)]
    pub success: bool,
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `FILE_TOO_LARGE`,
    /// `TOKEN_MISSING`, `TOKEN_INVALID`, `PERMISSION_DENIED`, `NOT_FOUND`,
    /// `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Semester must be between 1 and 8")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// Upload exceeded the byte cap. Contains the cap.
    FileTooLarge {
        limit: u64,
    },
    TokenMissing,
    TokenInvalid,
    PermissionDenied,
    NotFound(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let (status, code, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::FileTooLarge { limit } => (
                StatusCode::BAD_REQUEST,
                "FILE_TOO_LARGE",
                format!("File exceeds maximum size of {limit} bytes"),
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_MISSING",
                "Authentication required".into(),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                "Invalid or expired token".into(),
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                "Insufficient permissions".into(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An unexpected error occurred".into(),
                )
            }
        };

        (
            status,
            ErrorBody {
                success: false,
                code,
                message,
            },
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => {
                tracing::warn!("Blob missing from storage: {name}");
                AppError::NotFound("File not found".into())
            }
            StorageError::SizeLimitExceeded { limit, .. } => AppError::FileTooLarge { limit },
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// JSON body for requests that match no route.
pub async fn fallback() -> AppError {
    AppError::NotFound("Route not found".into())
}

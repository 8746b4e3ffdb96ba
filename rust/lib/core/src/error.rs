use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error codes carried in every error response body. The CLI matches on
/// these, never on the message text.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const CONFLICT: &str = "CONFLICT";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const READ_ONLY: &str = "READ_ONLY";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Failure of a lab operation, rendered as
/// `{"code": "CONFLICT", "message": "transfer 9c1e... was already received"}`.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// 404.
    #[error("{0}")]
    NotFound(String),

    /// A unique column (email, labIdentifier, assetId) is taken. 409.
    #[error("{0}")]
    AlreadyExists(String),

    /// The record's workflow state rules the operation out: an approval
    /// slot already filled, a transfer already received, a lab or asset
    /// still referenced. 409.
    #[error("{0}")]
    Conflict(String),

    /// 400.
    #[error("{0}")]
    Validation(String),

    /// No token, a bad token, or an account that no longer exists. 401.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller's role or lab does not allow the operation. 403.
    #[error("{0}")]
    PermissionDenied(String),

    /// Received transfers and activity logs cannot be edited. 403.
    #[error("{0}")]
    ReadOnly(String),

    /// SQLite failure. 500.
    #[error("{0}")]
    Storage(String),

    /// 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// `<table>/<id> not found`, the message every lookup miss uses.
    pub fn not_found(table: &str, id: &str) -> Self {
        ServiceError::NotFound(format!("{}/{} not found", table, id))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::AlreadyExists(_) => error_code::ALREADY_EXISTS,
            ServiceError::Conflict(_) => error_code::CONFLICT,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Unauthorized(_) => error_code::UNAUTHENTICATED,
            ServiceError::PermissionDenied(_) => error_code::PERMISSION_DENIED,
            ServiceError::ReadOnly(_) => error_code::READ_ONLY,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::AlreadyExists(_) | ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::PermissionDenied(_) | ServiceError::ReadOnly(_) => StatusCode::FORBIDDEN,
            ServiceError::Storage(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Internal(format!("json: {e}"))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

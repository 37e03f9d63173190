use crate::services::file_service::{BadRequestReason, ConfigurationIssue, FileError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// An HTTP-facing error: a status plus a deliberately generic message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Translate a file service failure.
    ///
    /// `upstream_message` is what the caller sees for backend failures, e.g.
    /// "Failed to upload file"; backend details stay in the logs.
    pub fn from_file_error(err: FileError, upstream_message: &str) -> Self {
        match err {
            FileError::BadRequest(BadRequestReason::MissingFile) => {
                Self::bad_request("No file uploaded")
            }
            FileError::BadRequest(BadRequestReason::MissingName) => {
                Self::bad_request("File name is required")
            }
            FileError::BadRequest(BadRequestReason::Unauthorized) => Self::new(
                StatusCode::UNAUTHORIZED,
                "Unauthorized - User authentication required",
            ),
            FileError::NotFound => Self::new(StatusCode::NOT_FOUND, "File not found"),
            FileError::Configuration(ConfigurationIssue::MissingBucket) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Bucket configuration is missing",
            ),
            FileError::Configuration(ConfigurationIssue::InvalidBucket(_)) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid bucket configuration",
            ),
            FileError::Upstream(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, upstream_message)
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "message": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

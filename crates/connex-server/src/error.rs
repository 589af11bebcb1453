//! Server-specific error types

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::cache::CacheError;
use crate::extractor::ExtractError;
use crate::jobs::JobStoreError;
use crate::pipeline::PipelineError;

/// Header naming the failure class on error responses.
pub const ERROR_TYPE_HEADER: &str = "x-error-type";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}: {details}")]
    BadRequest { message: String, details: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Max retries reached: {0}")]
    MaxRetriesExceeded(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
            details: details.into(),
        }
    }

    /// Value of the `X-Error-Type` header.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest { .. } => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::MaxRetriesExceeded(_) => "MaxRetriesExceeded",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::MaxRetriesExceeded(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let (error, details) = match self {
            AppError::BadRequest { message, details } => (message, details),
            AppError::NotFound(message) => ("Not found".to_string(), message),
            AppError::Conflict(message) => ("Conflict".to_string(), message),
            AppError::MaxRetriesExceeded(message) => {
                tracing::error!("Max retries reached: {}", message);
                (
                    "Max retries reached while trying to extract data".to_string(),
                    message,
                )
            },
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                ("Unexpected error occurred".to_string(), message)
            },
        };

        let body = Json(json!({
            "error": error,
            "details": details,
        }));

        let mut response = (status, body).into_response();
        response
            .headers_mut()
            .insert(ERROR_TYPE_HEADER, HeaderValue::from_static(kind));
        response
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Extract(e @ ExtractError::MaxRetriesExceeded { .. }) => {
                AppError::MaxRetriesExceeded(e.to_string())
            },
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JobStoreError> for AppError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => AppError::NotFound(format!("Job {} not found", id)),
            other => AppError::Conflict(other.to_string()),
        }
    }
}

//! Shared API types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::data::StorageError;

/// Handler error, rendered as a plain-text body with the matching status
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    UnsupportedMediaType(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Rejected metrics are the caller's fault; everything else is ours
    pub fn from_storage(e: StorageError) -> Self {
        if e.is_invalid_input() {
            return Self::BadRequest(e.to_string());
        }
        tracing::error!(error = %e, "Storage error");
        Self::Internal("Storage operation failed".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::UnsupportedMediaType(m)
            | Self::Internal(m) => m,
        };
        (status, message).into_response()
    }
}

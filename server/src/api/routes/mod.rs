//! API route handlers

pub mod health;
pub mod index;
pub mod update;
pub mod value;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;

use crate::api::types::ApiError;
use crate::core::constants::REQUEST_TIMEOUT_SECS;
use crate::data::{MetricStorage, StorageError};

/// State shared by every metrics handler
#[derive(Clone)]
pub struct MetricsApiState {
    pub storage: Arc<dyn MetricStorage>,
}

/// Run a storage call under the per-request deadline
pub(crate) async fn with_timeout<T>(
    call: impl Future<Output = Result<T, StorageError>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), call).await {
        Ok(result) => result.map_err(ApiError::from_storage),
        Err(_) => {
            tracing::warn!(timeout_secs = REQUEST_TIMEOUT_SECS, "Storage call timed out");
            Err(ApiError::internal("Storage operation timed out"))
        }
    }
}

/// Decode a JSON body, requiring an `application/json` content type
pub(crate) fn decode_json<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<T, ApiError> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json {
        return Err(ApiError::unsupported_media_type(
            "Invalid Content-Type, expected 'application/json'",
        ));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(e.to_string()))
}

//! Storage liveness endpoint

use axum::extract::State;
use axum::http::StatusCode;

use super::{MetricsApiState, with_timeout};
use crate::api::types::ApiError;

/// `GET /ping`: 200 when the storage backend answers
pub async fn ping(State(state): State<MetricsApiState>) -> Result<StatusCode, ApiError> {
    with_timeout(state.storage.ping()).await?;
    Ok(StatusCode::OK)
}

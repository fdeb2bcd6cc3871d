//! Metric update endpoints

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tally::Metric;

use super::{MetricsApiState, decode_json, with_timeout};
use crate::api::types::ApiError;

/// `POST /update/`: merge one metric and return the value this merge produced
pub async fn update_json(
    State(state): State<MetricsApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Metric>, ApiError> {
    let metric: Metric = decode_json(&headers, &body)?;
    let stored = with_timeout(state.storage.update(&metric)).await?;
    Ok(Json(stored))
}

/// `POST /update/{type}/{name}/{value}`
pub async fn update_path(
    State(state): State<MetricsApiState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let metric =
        Metric::parse(&kind, &name, &value).map_err(|e| ApiError::bad_request(e.to_string()))?;
    with_timeout(state.storage.update(&metric)).await?;
    Ok(StatusCode::OK)
}

/// `POST /updates/`: merge a batch of metrics
pub async fn update_batch(
    State(state): State<MetricsApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let metrics: Vec<Metric> = decode_json(&headers, &body)?;
    if metrics.is_empty() {
        return Ok((StatusCode::OK, "empty input").into_response());
    }

    with_timeout(state.storage.update_batch(&metrics)).await?;

    tracing::debug!(count = metrics.len(), "Batch applied");
    Ok(StatusCode::OK.into_response())
}

//! Metric lookup endpoints

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use tally::{Metric, MetricKind, MetricQuery};

use super::{MetricsApiState, decode_json, with_timeout};
use crate::api::types::ApiError;

fn parse_kind(kind: &str) -> Result<MetricKind, ApiError> {
    kind.parse()
        .map_err(|_| ApiError::not_found("Unsupported metric type"))
}

async fn lookup(state: &MetricsApiState, kind: &str, id: &str) -> Result<Metric, ApiError> {
    let kind = parse_kind(kind)?;
    with_timeout(state.storage.get(kind, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Metric not found"))
}

/// `POST /value/` with `{"id", "type"}`
pub async fn value_json(
    State(state): State<MetricsApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Metric>, ApiError> {
    let query: MetricQuery = decode_json(&headers, &body)?;
    lookup(&state, &query.kind, &query.id).await.map(Json)
}

/// `GET /value/{type}/{name}`: plain-text value
pub async fn value_plain(
    State(state): State<MetricsApiState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<String, ApiError> {
    lookup(&state, &kind, &name)
        .await
        .map(|metric| metric.value_string())
}

//! Request/response middleware

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tally::signing;

use super::types::ApiError;
use crate::core::constants::MAX_BODY_BYTES;

/// `HashSHA256` in the normalized form `HeaderMap` stores
const HASH_HEADER_NAME: HeaderName = HeaderName::from_static("hashsha256");

/// Shared signing key; `None` disables signature checks
#[derive(Clone, Default)]
pub struct SignatureState {
    key: Option<Arc<str>>,
}

impl SignatureState {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: key.map(Arc::from),
        }
    }
}

/// Verify request signatures and sign response bodies.
///
/// A POST carrying a `HashSHA256` header must match the HMAC of its
/// (decompressed) body or it is rejected with 400 before reaching a handler.
/// Requests without the header pass through.
pub async fn signature(State(state): State<SignatureState>, req: Request, next: Next) -> Response {
    let Some(key) = state.key else {
        return next.run(req).await;
    };

    let req = match verify_request(&key, req).await {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };

    let response = next.run(req).await;
    sign_response(&key, response).await
}

async fn verify_request(key: &str, req: Request) -> Result<Request, ApiError> {
    if req.method() != Method::POST {
        return Ok(req);
    }
    let Some(received) = req.headers().get(&HASH_HEADER_NAME).cloned() else {
        return Ok(req);
    };

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::bad_request("Failed to read request body"))?;
    let received = received
        .to_str()
        .map_err(|_| ApiError::bad_request("Invalid signature header"))?;

    if !signing::verify(key, &bytes, received) {
        tracing::warn!(method = %parts.method, uri = %parts.uri, "Request signature mismatch");
        return Err(ApiError::bad_request("Signature mismatch"));
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

async fn sign_response(key: &str, response: Response) -> Response {
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to buffer response body for signing");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Ok(value) = HeaderValue::from_str(&signing::sign(key, &bytes)) {
        parts.headers.insert(HASH_HEADER_NAME, value);
    }
    Response::from_parts(parts, Body::from(bytes))
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!(method = %req.method(), uri = %req.uri(), "[404]");
    (StatusCode::NOT_FOUND, "Not found")
}

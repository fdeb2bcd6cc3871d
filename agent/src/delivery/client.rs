use std::io::Write;
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use serde::Serialize;
use tally::HASH_HEADER;

use super::error::DeliveryError;
use super::retry::{RetryPolicy, retry_with_backoff_async};
use super::{DeliveryMode, SendTask};
use crate::core::constants::HTTP_TIMEOUT_SECS;

/// Request body ready to go on the wire, built once and reused across retries
struct Prepared {
    body: Vec<u8>,
    signature: Option<String>,
    compressed: bool,
}

/// HTTP client posting metric payloads to the collector service
pub struct MetricsClient {
    http: reqwest::Client,
    mode: DeliveryMode,
    compress: bool,
    retry: RetryPolicy,
}

impl MetricsClient {
    pub fn new(mode: DeliveryMode, compress: bool, retry: RetryPolicy) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            mode,
            compress,
            retry,
        })
    }

    /// Send one task's slice and return how many requests were dropped
    pub async fn deliver(&self, task: &SendTask) -> usize {
        let key = task.key.as_deref();
        match self.mode {
            DeliveryMode::Batch => {
                let url = format!("{}/updates/", task.url);
                usize::from(!self.post_logged(&url, key, &task.metrics, task.metrics.len()).await)
            }
            DeliveryMode::Individual => {
                let url = format!("{}/update/", task.url);
                let mut dropped = 0;
                for metric in &task.metrics {
                    if !self.post_logged(&url, key, metric, 1).await {
                        dropped += 1;
                    }
                }
                dropped
            }
        }
    }

    async fn post_logged<T: Serialize + ?Sized>(
        &self,
        url: &str,
        key: Option<&str>,
        payload: &T,
        count: usize,
    ) -> bool {
        match self.post(url, key, payload).await {
            Ok(attempts) => {
                tracing::debug!(url, count, attempts, "Metrics delivered");
                true
            }
            Err((e, attempts)) => {
                tracing::error!(url, count, attempts, error = %e, "Dropping metrics after failed delivery");
                false
            }
        }
    }

    /// POST a JSON payload, retrying transient failures per the policy.
    ///
    /// Returns `Ok(attempts)` on success, or `Err((error, attempts))` on failure.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        key: Option<&str>,
        payload: &T,
    ) -> Result<u32, (DeliveryError, u32)> {
        let prepared = self.prepare(key, payload).map_err(|e| (e, 0))?;
        retry_with_backoff_async(
            self.retry,
            || self.post_once(url, &prepared),
            DeliveryError::is_transient,
        )
        .await
    }

    fn prepare<T: Serialize + ?Sized>(
        &self,
        key: Option<&str>,
        payload: &T,
    ) -> Result<Prepared, DeliveryError> {
        let json = serde_json::to_vec(payload)?;
        let signature = key.map(|key| tally::signing::sign(key, &json));

        if !self.compress {
            return Ok(Prepared {
                body: json,
                signature,
                compressed: false,
            });
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        Ok(Prepared {
            body: encoder.finish()?,
            signature,
            compressed: true,
        })
    }

    async fn post_once(&self, url: &str, prepared: &Prepared) -> Result<(), DeliveryError> {
        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(prepared.body.clone());
        if prepared.compressed {
            request = request.header(CONTENT_ENCODING, "gzip");
        }
        if let Some(signature) = &prepared.signature {
            request = request.header(HASH_HEADER, signature);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Status { status, body })
    }
}

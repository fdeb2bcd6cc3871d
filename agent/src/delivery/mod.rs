//! Delivery worker pool
//!
//! A fixed number of workers share one bounded queue of [`SendTask`]s. Each
//! task is delivered through [`MetricsClient`], retried on transient failure
//! and dropped once the retry budget is spent. Workers exit when the queue is
//! closed and empty.

mod client;
mod error;
mod retry;

pub use client::MetricsClient;
pub use error::DeliveryError;
pub use retry::RetryPolicy;

use std::sync::Arc;

use tally::Metric;
use tokio::sync::{Mutex, mpsc};
use tokio_util::task::TaskTracker;

/// How a flushed slice is put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// One `POST /update/` per metric
    Individual,
    /// One `POST /updates/` per slice
    Batch,
}

/// One slice of a flushed batch bound for the collector service
#[derive(Debug, Clone)]
pub struct SendTask {
    pub metrics: Vec<Metric>,
    /// Base URL of the collector service
    pub url: Arc<str>,
    pub key: Option<Arc<str>>,
}

/// Spawn `workers` delivery workers on `tracker`, all draining `rx`
pub fn spawn_workers(
    client: Arc<MetricsClient>,
    rx: mpsc::Receiver<SendTask>,
    workers: usize,
    tracker: &TaskTracker,
) {
    let rx = Arc::new(Mutex::new(rx));
    for worker in 0..workers {
        let client = Arc::clone(&client);
        let rx = Arc::clone(&rx);
        tracker.spawn(async move {
            tracing::debug!(worker, "Delivery worker started");
            loop {
                let task = rx.lock().await.recv().await;
                let Some(task) = task else { break };
                let dropped = client.deliver(&task).await;
                if dropped > 0 {
                    tracing::warn!(worker, dropped, "Delivery task finished with dropped requests");
                }
            }
            tracing::debug!(worker, "Delivery worker stopped");
        });
    }
}

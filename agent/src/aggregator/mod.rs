//! Batch aggregation between the collector and the delivery pool

mod cache;

pub use cache::{BatchCache, split_batch};

use std::sync::Arc;
use std::time::Duration;

use tally::Metric;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::delivery::SendTask;

/// Single owner of the batch cache, fed by the collector's channel
pub struct Aggregator {
    cache: BatchCache,
    url: Arc<str>,
    key: Option<Arc<str>>,
    slices: usize,
    report_interval: Duration,
}

impl Aggregator {
    pub fn new(
        url: Arc<str>,
        key: Option<Arc<str>>,
        slices: usize,
        report_interval: Duration,
    ) -> Self {
        Self {
            cache: BatchCache::new(),
            url,
            key,
            slices,
            report_interval,
        }
    }

    /// Ingest samples and hand a flushed batch to `tasks` every report interval.
    ///
    /// Dispatch never waits for queue space. On cancellation the channel is
    /// drained, one final batch is dispatched and `tasks` is dropped, closing
    /// the worker queue.
    pub async fn run(
        self,
        mut samples: mpsc::Receiver<Vec<Metric>>,
        tasks: mpsc::Sender<SendTask>,
        token: CancellationToken,
    ) {
        let start = tokio::time::Instant::now() + self.report_interval;
        let mut ticker = tokio::time::interval_at(start, self.report_interval);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.dispatch(&tasks),
                batch = samples.recv() => match batch {
                    Some(batch) => self.ingest(batch),
                    None => break,
                },
            }
        }

        samples.close();
        while let Some(batch) = samples.recv().await {
            self.ingest(batch);
        }
        self.dispatch(&tasks);
        tracing::debug!("Aggregator stopped");
    }

    fn ingest(&self, batch: Vec<Metric>) {
        for metric in batch {
            let id = metric.id().to_string();
            if let Err(e) = self.cache.ingest(metric) {
                tracing::warn!(metric = %id, error = %e, "Discarding sample");
            }
        }
    }

    /// Queue the flushed batch without waiting on delivery.
    ///
    /// Slices that do not fit in the delivery queue are dropped.
    fn dispatch(&self, tasks: &mpsc::Sender<SendTask>) {
        let batch = self.cache.flush();
        if batch.is_empty() {
            return;
        }

        let total = batch.len();
        let slices = split_batch(batch, self.slices);
        tracing::debug!(metrics = total, slices = slices.len(), "Dispatching batch");

        for metrics in slices {
            let count = metrics.len();
            let task = SendTask {
                metrics,
                url: Arc::clone(&self.url),
                key: self.key.clone(),
            };
            match tasks.try_send(task) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(metrics = count, "Delivery queue full, dropping slice");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!("Delivery queue closed, dropping batch");
                    return;
                }
            }
        }
    }
}

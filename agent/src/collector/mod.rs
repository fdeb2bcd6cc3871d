//! Periodic metric sampling
//!
//! Every poll tick the runtime group, the host group and the `PollCount`
//! counter are sampled concurrently and sent as one batch to the aggregator.

mod host;
mod runtime;

pub use host::HostSampler;
pub use runtime::RuntimeSampler;

use std::time::Duration;

use tally::Metric;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::constants::POLL_COUNT;

pub struct Collector {
    runtime: RuntimeSampler,
    host: HostSampler,
    poll_interval: Duration,
}

impl Collector {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            runtime: RuntimeSampler::new(),
            host: HostSampler::new(),
            poll_interval,
        }
    }

    /// Sample every poll interval until cancelled or the aggregator goes away
    pub async fn run(self, samples: mpsc::Sender<Vec<Metric>>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let batch = self.collect().await;
            tracing::trace!(metrics = batch.len(), "Collected samples");

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                sent = samples.send(batch) => {
                    if sent.is_err() {
                        tracing::debug!("Sample channel closed");
                        break;
                    }
                }
            }
        }
        tracing::debug!("Collector stopped");
    }

    /// One combined batch from all producers
    pub async fn collect(&self) -> Vec<Metric> {
        let (mut runtime, host, poll) = tokio::join!(
            self.runtime.sample(),
            self.host.sample(),
            async { Metric::counter(POLL_COUNT, 1) },
        );
        runtime.extend(host);
        runtime.push(poll);
        runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_combines_groups() {
        let batch = Collector::new(Duration::from_secs(1)).collect().await;

        assert!(batch.contains(&Metric::counter(POLL_COUNT, 1)));
        assert!(batch.iter().any(|m| m.id() == "TotalMemory"));
        assert!(batch.iter().any(|m| m.id() == "RuntimeWorkers"));
    }

    #[tokio::test]
    async fn test_run_sends_each_tick_until_cancelled() {
        let (tx, mut rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let handle = tokio::spawn(Collector::new(Duration::from_millis(20)).run(tx, token.clone()));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.contains(&Metric::counter(POLL_COUNT, 1)));
        assert!(second.contains(&Metric::counter(POLL_COUNT, 1)));

        token.cancel();
        handle.await.unwrap();
        while rx.recv().await.is_some() {}
    }
}

//! Agent pipeline supervision
//!
//! collector -> (samples) -> aggregator -> (send tasks) -> delivery workers
//!
//! One cancellation token stops the collector and the aggregator. The
//! aggregator's final flush closes the task queue, which lets the workers
//! finish in-flight sends and exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::aggregator::Aggregator;
use crate::collector::Collector;
use crate::core::config::AgentConfig;
use crate::core::constants::{INGEST_QUEUE_CAPACITY, SHUTDOWN_TIMEOUT_SECS, TASK_QUEUE_CAPACITY};
use crate::delivery::{self, DeliveryError, MetricsClient};

pub struct Pipeline {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Pipeline {
    /// Spawn workers, aggregator and collector
    pub fn start(config: &AgentConfig) -> Result<Self, DeliveryError> {
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let (sample_tx, sample_rx) = mpsc::channel(INGEST_QUEUE_CAPACITY);
        let (task_tx, task_rx) = mpsc::channel(TASK_QUEUE_CAPACITY);

        let client = Arc::new(MetricsClient::new(
            config.mode,
            config.compress,
            config.retry,
        )?);
        delivery::spawn_workers(client, task_rx, config.rate_limit, &tracker);

        let aggregator = Aggregator::new(
            Arc::from(config.server_url()),
            config.key.clone(),
            config.rate_limit,
            config.report_interval,
        );
        tracker.spawn(aggregator.run(sample_rx, task_tx, token.clone()));
        tracker.spawn(Collector::new(config.poll_interval).run(sample_tx, token.clone()));
        tracker.close();

        tracing::debug!(workers = config.rate_limit, "Pipeline started");
        Ok(Self { token, tracker })
    }

    /// Token cancelled when the pipeline is asked to stop
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel on Ctrl+C/SIGTERM
    pub fn install_signal_handlers(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut signal) => {
                        signal.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
                _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
                _ = token.cancelled() => return,
            }

            token.cancel();
        });
    }

    /// Cancel and wait for every pipeline task to finish
    pub async fn shutdown(&self) {
        tracing::debug!("Initiating graceful shutdown...");
        self.token.cancel();

        let timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => tracing::debug!("All pipeline tasks completed"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                pending = self.tracker.len(),
                "Timeout waiting for pipeline tasks"
            ),
        }
    }
}

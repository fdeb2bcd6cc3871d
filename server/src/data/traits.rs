//! Storage capability contract

use std::collections::BTreeMap;

use async_trait::async_trait;
use tally::{Metric, MetricKind, SeriesKey};

use super::error::StorageError;

/// Point-in-time copy of every stored series
pub type Snapshot = BTreeMap<SeriesKey, Metric>;

/// Metric storage backend
///
/// Implemented by the in-memory, file-snapshot and relational backends.
/// Exactly one backend is selected at startup and shared behind
/// `Arc<dyn MetricStorage>`.
///
/// Updates go through the counter/gauge merge rule: counters add the incoming
/// delta, gauges take the incoming value. Updates to the same series are
/// linearized; readers only ever see fully merged values.
#[async_trait]
pub trait MetricStorage: Send + Sync {
    /// Merge one metric into its series, creating the series if absent.
    ///
    /// Returns the series value produced by this merge.
    async fn update(&self, metric: &Metric) -> Result<Metric, StorageError>;

    /// Merge every metric in order.
    ///
    /// Empty input is a no-op. On failure the database backend rolls back
    /// the whole batch; the memory and file backends keep the merges applied
    /// before the failing metric.
    async fn update_batch(&self, metrics: &[Metric]) -> Result<(), StorageError>;

    /// Look up one series; `None` if absent
    async fn get(&self, kind: MetricKind, id: &str) -> Result<Option<Metric>, StorageError>;

    /// Copy of all series
    async fn get_all(&self) -> Result<Snapshot, StorageError>;

    /// Liveness probe of the backing medium
    async fn ping(&self) -> Result<(), StorageError>;

    /// Flush and release resources. Safe to call more than once.
    async fn close(&self) -> Result<(), StorageError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

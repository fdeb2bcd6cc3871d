//! In-memory storage backend

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tally::{Metric, MetricKind, SeriesKey};

use super::error::StorageError;
use super::traits::{MetricStorage, Snapshot};

/// Series map guarded by a reader/writer lock
///
/// Writers hold the exclusive lock for the whole merge, readers share it.
/// Each merge stores a freshly built value, so a reader sees either the
/// value before or after an update, never a partial one.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    series: RwLock<HashMap<SeriesKey, Metric>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(
        series: &mut HashMap<SeriesKey, Metric>,
        metric: &Metric,
    ) -> Result<Metric, StorageError> {
        let key = metric.series_key();
        let merged = Metric::merge_into(series.get(&key), metric)?;
        series.insert(key, merged.clone());
        Ok(merged)
    }

    pub fn update(&self, metric: &Metric) -> Result<Metric, StorageError> {
        Self::apply(&mut self.series.write(), metric)
    }

    /// Merge metrics one by one; stops at the first invalid metric, keeping earlier merges
    pub fn update_batch(&self, metrics: &[Metric]) -> Result<(), StorageError> {
        let mut series = self.series.write();
        for metric in metrics {
            Self::apply(&mut series, metric)?;
        }
        Ok(())
    }

    pub fn get(&self, kind: MetricKind, id: &str) -> Option<Metric> {
        self.series.read().get(&SeriesKey::new(kind, id)).cloned()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.series
            .read()
            .iter()
            .map(|(key, metric)| (key.clone(), metric.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.series.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.read().is_empty()
    }
}

#[async_trait]
impl MetricStorage for MemoryStorage {
    async fn update(&self, metric: &Metric) -> Result<Metric, StorageError> {
        MemoryStorage::update(self, metric)
    }

    async fn update_batch(&self, metrics: &[Metric]) -> Result<(), StorageError> {
        MemoryStorage::update_batch(self, metrics)
    }

    async fn get(&self, kind: MetricKind, id: &str) -> Result<Option<Metric>, StorageError> {
        Ok(MemoryStorage::get(self, kind, id))
    }

    async fn get_all(&self) -> Result<Snapshot, StorageError> {
        Ok(self.snapshot())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_counter_accumulates() {
        let storage = MemoryStorage::new();
        storage.update(&Metric::counter("hits", 5)).unwrap();
        storage.update(&Metric::counter("hits", 3)).unwrap();
        assert_eq!(
            storage.get(MetricKind::Counter, "hits"),
            Some(Metric::counter("hits", 8))
        );
    }

    #[test]
    fn test_gauge_last_write_wins() {
        let storage = MemoryStorage::new();
        storage.update(&Metric::gauge("temp", 10.0)).unwrap();
        storage.update(&Metric::gauge("temp", 7.5)).unwrap();
        assert_eq!(
            storage.get(MetricKind::Gauge, "temp"),
            Some(Metric::gauge("temp", 7.5))
        );
    }

    #[test]
    fn test_update_returns_merged_value() {
        let storage = MemoryStorage::new();
        assert_eq!(
            storage.update(&Metric::counter("hits", 5)).unwrap(),
            Metric::counter("hits", 5)
        );
        assert_eq!(
            storage.update(&Metric::counter("hits", 3)).unwrap(),
            Metric::counter("hits", 8)
        );
    }

    #[test]
    fn test_counter_overflow_keeps_series() {
        let storage = MemoryStorage::new();
        storage.update(&Metric::counter("c", i64::MAX)).unwrap();
        let err = storage.update(&Metric::counter("c", 1)).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(
            storage.get(MetricKind::Counter, "c"),
            Some(Metric::counter("c", i64::MAX))
        );
    }

    #[test]
    fn test_get_kind_mismatch_is_absent() {
        let storage = MemoryStorage::new();
        storage.update(&Metric::counter("cpu", 1)).unwrap();
        assert_eq!(storage.get(MetricKind::Gauge, "cpu"), None);
        assert_eq!(storage.get(MetricKind::Counter, "missing"), None);
    }

    #[test]
    fn test_batch_keeps_merges_before_failure() {
        let storage = MemoryStorage::new();
        let batch = vec![
            Metric::counter("a", 1),
            Metric::counter("b", 2),
            Metric::gauge("c", 3.0),
            Metric::gauge("d", 4.0),
            Metric::counter("", 5),
            Metric::counter("e", 6),
        ];
        let err = storage.update_batch(&batch).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(storage.len(), 4);
        assert_eq!(storage.get(MetricKind::Counter, "e"), None);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let storage = MemoryStorage::new();
        storage.update_batch(&[]).unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_overflow_leaves_value_untouched() {
        let storage = MemoryStorage::new();
        storage.update(&Metric::counter("c", i64::MAX)).unwrap();
        assert!(storage.update(&Metric::counter("c", 1)).is_err());
        assert_eq!(
            storage.get(MetricKind::Counter, "c"),
            Some(Metric::counter("c", i64::MAX))
        );
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let storage = MemoryStorage::new();
        storage.update(&Metric::counter("c", 1)).unwrap();
        let mut snapshot = storage.snapshot();
        snapshot.clear();
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_counter_updates() {
        let storage = Arc::new(MemoryStorage::new());
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move {
                    MetricStorage::update(storage.as_ref(), &Metric::counter("c", 1))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(
            storage.get(MetricKind::Counter, "c"),
            Some(Metric::counter("c", 100))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_torn_reads() {
        let storage = Arc::new(MemoryStorage::new());
        storage.update(&Metric::counter("c", 0)).unwrap();

        let writer = {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                for _ in 0..500 {
                    storage.update(&Metric::counter("c", 2)).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                let mut last = 0;
                for _ in 0..500 {
                    let snapshot = storage.snapshot();
                    let Some(Metric::Counter { delta, .. }) =
                        snapshot.get(&SeriesKey::new(MetricKind::Counter, "c"))
                    else {
                        panic!("counter missing from snapshot");
                    };
                    assert_eq!(delta % 2, 0, "observed partial merge");
                    assert!(*delta >= last, "observed value went backwards");
                    last = *delta;
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(
            storage.get(MetricKind::Counter, "c"),
            Some(Metric::counter("c", 1000))
        );
    }
}

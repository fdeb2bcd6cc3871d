use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tally::{Metric, MetricError, SeriesKey};

#[derive(Default)]
struct CacheState {
    /// Last value seen per series, counters hold the delta accumulated this cycle
    last: HashMap<SeriesKey, Metric>,
    /// Series staged for the next flush, in first-staged order
    pending: Vec<SeriesKey>,
    staged: HashSet<SeriesKey>,
}

impl CacheState {
    fn stage(&mut self, key: SeriesKey) {
        if self.staged.insert(key.clone()) {
            self.pending.push(key);
        }
    }
}

/// Last-value cache and pending batch, always mutated together
#[derive(Default)]
pub struct BatchCache {
    state: Mutex<CacheState>,
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the cache.
    ///
    /// Counters merge into the cached delta and are staged. Gauges are staged
    /// only when first seen or when their value changed. Returns whether the
    /// sample changed what the next flush will carry.
    pub fn ingest(&self, metric: Metric) -> Result<bool, MetricError> {
        let key = metric.series_key();
        let mut state = self.state.lock();

        let next = match (&metric, state.last.get(&key)) {
            (Metric::Gauge { value, .. }, Some(Metric::Gauge { value: cached, .. }))
                if value.to_bits() == cached.to_bits() =>
            {
                return Ok(false);
            }
            (_, cached) => Metric::merge_into(cached, &metric)?,
        };

        state.last.insert(key.clone(), next);
        state.stage(key);
        Ok(true)
    }

    /// Swap the pending batch out and zero cached counters for the next cycle
    pub fn flush(&self) -> Vec<Metric> {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        state.staged.clear();

        let batch: Vec<Metric> = pending
            .iter()
            .filter_map(|key| state.last.get(key).cloned())
            .collect();

        for metric in state.last.values_mut() {
            if matches!(metric, Metric::Counter { .. }) {
                *metric = metric.zeroed();
            }
        }
        batch
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }
}

/// Split a flushed batch into `min(n, len)` contiguous slices.
///
/// Every slice holds `len / n` metrics except the last, which also takes the
/// remainder. An empty batch yields no slices.
pub fn split_batch(mut batch: Vec<Metric>, n: usize) -> Vec<Vec<Metric>> {
    let n = n.min(batch.len());
    if n == 0 {
        return Vec::new();
    }

    let size = batch.len() / n;
    let mut slices = Vec::with_capacity(n);
    for _ in 1..n {
        let rest = batch.split_off(size);
        slices.push(batch);
        batch = rest;
    }
    slices.push(batch);
    slices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauges(n: usize) -> Vec<Metric> {
        (0..n).map(|i| Metric::gauge(format!("g{i}"), i as f64)).collect()
    }

    #[test]
    fn test_counter_merges_within_cycle() {
        let cache = BatchCache::new();
        assert!(cache.ingest(Metric::counter("PollCount", 1)).unwrap());
        assert!(cache.ingest(Metric::counter("PollCount", 1)).unwrap());
        assert!(cache.ingest(Metric::counter("PollCount", 1)).unwrap());
        assert_eq!(cache.pending_len(), 1);
        assert_eq!(cache.flush(), vec![Metric::counter("PollCount", 3)]);
    }

    #[test]
    fn test_counter_zeroed_after_flush() {
        let cache = BatchCache::new();
        cache.ingest(Metric::counter("PollCount", 5)).unwrap();
        cache.flush();

        assert!(cache.flush().is_empty());
        cache.ingest(Metric::counter("PollCount", 2)).unwrap();
        assert_eq!(cache.flush(), vec![Metric::counter("PollCount", 2)]);
    }

    #[test]
    fn test_unchanged_gauge_not_restaged() {
        let cache = BatchCache::new();
        assert!(cache.ingest(Metric::gauge("TotalMemory", 16.0)).unwrap());
        assert_eq!(cache.flush(), vec![Metric::gauge("TotalMemory", 16.0)]);

        assert!(!cache.ingest(Metric::gauge("TotalMemory", 16.0)).unwrap());
        assert!(cache.flush().is_empty());

        assert!(cache.ingest(Metric::gauge("TotalMemory", 12.0)).unwrap());
        assert_eq!(cache.flush(), vec![Metric::gauge("TotalMemory", 12.0)]);
    }

    #[test]
    fn test_changed_gauge_replaces_staged_value() {
        let cache = BatchCache::new();
        cache.ingest(Metric::gauge("FreeMemory", 4.0)).unwrap();
        cache.ingest(Metric::gauge("FreeMemory", 3.0)).unwrap();
        assert_eq!(cache.pending_len(), 1);
        assert_eq!(cache.flush(), vec![Metric::gauge("FreeMemory", 3.0)]);
    }

    #[test]
    fn test_same_id_different_kinds_are_separate_series() {
        let cache = BatchCache::new();
        cache.ingest(Metric::counter("load", 1)).unwrap();
        cache.ingest(Metric::gauge("load", 0.5)).unwrap();
        assert_eq!(cache.flush().len(), 2);
    }

    #[test]
    fn test_invalid_sample_rejected() {
        let cache = BatchCache::new();
        assert!(cache.ingest(Metric::gauge("CPUutilization1", f64::NAN)).is_err());
        assert_eq!(cache.pending_len(), 0);
    }

    #[test]
    fn test_flush_preserves_staging_order() {
        let cache = BatchCache::new();
        for metric in gauges(3) {
            cache.ingest(metric).unwrap();
        }
        assert_eq!(cache.flush(), gauges(3));
    }

    #[test]
    fn test_split_batch_remainder_goes_last() {
        let slices = split_batch(gauges(10), 3);
        let sizes: Vec<_> = slices.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 4]);
        assert_eq!(slices.concat(), gauges(10));
    }

    #[test]
    fn test_split_batch_more_workers_than_metrics() {
        let slices = split_batch(gauges(2), 5);
        assert_eq!(slices, vec![gauges(2)[..1].to_vec(), gauges(2)[1..].to_vec()]);
    }

    #[test]
    fn test_split_batch_empty() {
        assert!(split_batch(Vec::new(), 4).is_empty());
        assert_eq!(split_batch(gauges(4), 1), vec![gauges(4)]);
    }
}

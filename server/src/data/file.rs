//! File-snapshot storage backend
//!
//! Wraps [`MemoryStorage`] and persists the full series map as one JSON
//! object keyed by `kind:id`. Every save truncates the file and rewrites it
//! from offset zero, then syncs it to disk.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tally::{Metric, MetricKind};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::error::StorageError;
use super::memory::MemoryStorage;
use super::traits::{MetricStorage, Snapshot};

/// When the snapshot is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Save after every update (store interval of zero)
    Sync,
    /// Save on a fixed timer
    Periodic(Duration),
}

impl SaveMode {
    pub fn from_interval(interval: Duration) -> Self {
        if interval.is_zero() {
            Self::Sync
        } else {
            Self::Periodic(interval)
        }
    }
}

pub struct FileStorage {
    memory: MemoryStorage,
    path: PathBuf,
    mode: SaveMode,
    /// `None` once closed
    file: Mutex<Option<File>>,
}

impl FileStorage {
    /// Open (or create) the snapshot file
    pub async fn open(path: impl AsRef<Path>, mode: SaveMode) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;

        tracing::debug!(path = %path.display(), mode = ?mode, "Snapshot file opened");
        Ok(Self {
            memory: MemoryStorage::new(),
            path,
            mode,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> SaveMode {
        self.mode
    }

    /// Replay the snapshot file into memory.
    ///
    /// An empty file is an empty store. Malformed JSON is an error. Entries
    /// go through the merge rule, so loading on top of live data accumulates
    /// counters instead of overwriting them.
    pub async fn load(&self) -> Result<usize, StorageError> {
        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or(StorageError::Closed)?;

        file.seek(SeekFrom::Start(0)).await?;
        let mut content = String::new();
        file.read_to_string(&mut content).await?;
        if content.trim().is_empty() {
            tracing::debug!(path = %self.path.display(), "Snapshot file is empty, nothing to restore");
            return Ok(0);
        }

        let snapshot: Snapshot = serde_json::from_str(&content)?;
        for (key, metric) in &snapshot {
            if *key != metric.series_key() {
                tracing::warn!(key = %key, id = metric.id(), "Snapshot key does not match its metric");
            }
            self.memory.update(metric)?;
        }

        tracing::info!(
            path = %self.path.display(),
            series = snapshot.len(),
            "Restored metrics from snapshot"
        );
        Ok(snapshot.len())
    }

    /// Write the current snapshot to disk
    pub async fn save(&self) -> Result<(), StorageError> {
        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or(StorageError::Closed)?;
        self.write_snapshot(file).await
    }

    async fn write_snapshot(&self, file: &mut File) -> Result<(), StorageError> {
        let snapshot = self.memory.snapshot();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        file.set_len(0).await?;
        file.seek(SeekFrom::Start(0)).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;

        tracing::trace!(series = snapshot.len(), bytes = bytes.len(), "Snapshot saved");
        Ok(())
    }

    async fn save_if_sync(&self) -> Result<(), StorageError> {
        match self.mode {
            SaveMode::Sync => self.save().await,
            SaveMode::Periodic(_) => Ok(()),
        }
    }

    /// Start the periodic save task. Returns `None` in sync mode.
    ///
    /// The task exits on shutdown without saving; the final save is done by
    /// [`MetricStorage::close`].
    pub fn start_persistence_task(
        self: &Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        let SaveMode::Periodic(period) = self.mode else {
            return None;
        };

        let storage = Arc::clone(self);
        Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Snapshot persistence task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match storage.save().await {
                            Ok(()) => tracing::debug!(path = %storage.path.display(), "Periodic snapshot saved"),
                            Err(StorageError::Closed) => break,
                            Err(e) => tracing::warn!(error = %e, "Periodic snapshot save failed"),
                        }
                    }
                }
            }
        }))
    }
}

#[async_trait]
impl MetricStorage for FileStorage {
    async fn update(&self, metric: &Metric) -> Result<Metric, StorageError> {
        let merged = self.memory.update(metric)?;
        self.save_if_sync().await?;
        Ok(merged)
    }

    async fn update_batch(&self, metrics: &[Metric]) -> Result<(), StorageError> {
        if metrics.is_empty() {
            return Ok(());
        }
        let merged = self.memory.update_batch(metrics);
        // Earlier merges of a failed batch are kept, so they are persisted too
        self.save_if_sync().await?;
        merged
    }

    async fn get(&self, kind: MetricKind, id: &str) -> Result<Option<Metric>, StorageError> {
        Ok(self.memory.get(kind, id))
    }

    async fn get_all(&self) -> Result<Snapshot, StorageError> {
        Ok(self.memory.snapshot())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        if self.file.lock().await.is_some() {
            Ok(())
        } else {
            Err(StorageError::Closed)
        }
    }

    async fn close(&self) -> Result<(), StorageError> {
        let Some(mut file) = self.file.lock().await.take() else {
            return Ok(());
        };
        self.write_snapshot(&mut file).await?;
        tracing::debug!(path = %self.path.display(), "Snapshot file closed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(dir: &tempfile::TempDir, mode: SaveMode) -> FileStorage {
        FileStorage::open(dir.path().join("metrics.json"), mode)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir, SaveMode::Sync).await;
        assert_eq!(storage.load().await.unwrap(), 0);
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::open(&path, SaveMode::Sync).await.unwrap();
        let err = storage.load().await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir, SaveMode::Periodic(Duration::from_secs(300))).await;
        storage
            .update_batch(&[
                Metric::counter("PollCount", 12),
                Metric::gauge("Alloc", 1024.5),
                Metric::gauge("PollCount", -1.0),
            ])
            .await
            .unwrap();
        let before = storage.get_all().await.unwrap();
        storage.close().await.unwrap();

        let restored = open(&dir, SaveMode::Sync).await;
        assert_eq!(restored.load().await.unwrap(), 3);
        assert_eq!(restored.get_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_snapshot_layout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir, SaveMode::Sync).await;
        storage.update(&Metric::counter("hits", 2)).await.unwrap();

        let content = std::fs::read_to_string(storage.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"counter:hits": {"id": "hits", "type": "counter", "delta": 2}})
        );
    }

    #[tokio::test]
    async fn test_save_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir, SaveMode::Sync).await;
        storage
            .update(&Metric::gauge("a_rather_long_series_name", 1.0))
            .await
            .unwrap();
        storage.close().await.unwrap();

        // Not restored, so the next save writes a much shorter snapshot
        let storage = open(&dir, SaveMode::Sync).await;
        storage.update(&Metric::gauge("b", 2.0)).await.unwrap();
        let reloaded = open(&dir, SaveMode::Sync).await;
        reloaded.load().await.unwrap();
        let all = reloaded.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(
            reloaded.get(MetricKind::Gauge, "b").await.unwrap(),
            Some(Metric::gauge("b", 2.0))
        );
    }

    #[tokio::test]
    async fn test_load_merges_into_existing_counters() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir, SaveMode::Sync).await;
        storage.update(&Metric::counter("c", 5)).await.unwrap();
        storage.close().await.unwrap();

        let restored = open(&dir, SaveMode::Periodic(Duration::from_secs(60))).await;
        restored.update(&Metric::counter("c", 1)).await.unwrap();
        restored.load().await.unwrap();
        assert_eq!(
            restored.get(MetricKind::Counter, "c").await.unwrap(),
            Some(Metric::counter("c", 6))
        );
    }

    #[tokio::test]
    async fn test_close_twice_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir, SaveMode::Periodic(Duration::from_secs(300))).await;
        storage.update(&Metric::counter("a", 1)).await.unwrap();

        storage.close().await.unwrap();
        let after_first = std::fs::read_to_string(storage.path()).unwrap();

        storage.update(&Metric::counter("b", 1)).await.unwrap();
        storage.close().await.unwrap();
        let after_second = std::fs::read_to_string(storage.path()).unwrap();

        assert_eq!(after_first, after_second);
        assert!(matches!(storage.save().await, Err(StorageError::Closed)));
        assert!(storage.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_batch_persists_earlier_merges() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir, SaveMode::Sync).await;
        let result = storage
            .update_batch(&[Metric::counter("a", 1), Metric::counter("", 1)])
            .await;
        assert!(result.is_err());

        let reloaded = open(&dir, SaveMode::Sync).await;
        assert_eq!(reloaded.load().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_periodic_task_saves_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(open(&dir, SaveMode::Periodic(Duration::from_millis(20))).await);
        storage.update(&Metric::gauge("g", 4.0)).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = storage.start_persistence_task(rx).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let content = std::fs::read_to_string(storage.path()).unwrap();
        assert!(content.contains("gauge:g"));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_sync_mode_has_no_task() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(open(&dir, SaveMode::Sync).await);
        let (_tx, rx) = watch::channel(false);
        assert!(storage.start_persistence_task(rx).is_none());
    }

    #[test]
    fn test_save_mode_from_interval() {
        assert_eq!(SaveMode::from_interval(Duration::ZERO), SaveMode::Sync);
        assert_eq!(
            SaveMode::from_interval(Duration::from_secs(5)),
            SaveMode::Periodic(Duration::from_secs(5))
        );
    }
}

//! Metric storage layer
//!
//! - `memory` - Series map behind a reader/writer lock
//! - `file` - Memory backend persisted to a JSON snapshot file
//! - `database` - PostgreSQL (or SQLite) tables with upsert accumulation
//! - `traits` - The `MetricStorage` contract shared by all backends
//! - `error` - Unified error type for all backends
//!
//! Exactly one backend is chosen at startup by [`StorageService::init`].
//! Everything above this layer talks to `Arc<dyn MetricStorage>`.

pub mod database;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use database::DatabaseStorage;
pub use error::StorageError;
pub use file::{FileStorage, SaveMode};
pub use memory::MemoryStorage;
pub use traits::{MetricStorage, Snapshot};

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::StorageConfig;

/// Storage selected from configuration
pub struct StorageService {
    storage: Arc<dyn MetricStorage>,
    file: Option<Arc<FileStorage>>,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("backend", &self.storage.backend_name())
            .finish()
    }
}

impl StorageService {
    /// Initialize the backend.
    ///
    /// A database DSN wins over a snapshot path; with neither, metrics live
    /// in memory only.
    pub async fn init(config: &StorageConfig) -> Result<Self, StorageError> {
        if let Some(dsn) = config.database_dsn.as_deref() {
            tracing::debug!("Initializing database storage");
            let database = DatabaseStorage::init(dsn).await?;
            return Ok(Self {
                storage: Arc::new(database),
                file: None,
            });
        }

        if let Some(path) = config.file_storage_path.as_deref() {
            let mode = SaveMode::from_interval(config.store_interval);
            tracing::debug!(path = %path.display(), mode = ?mode, "Initializing file storage");
            let file = Arc::new(FileStorage::open(path, mode).await?);
            if config.restore {
                file.load().await?;
            }
            return Ok(Self {
                storage: file.clone(),
                file: Some(file),
            });
        }

        tracing::debug!("Initializing in-memory storage");
        Ok(Self {
            storage: Arc::new(MemoryStorage::new()),
            file: None,
        })
    }

    pub fn storage(&self) -> Arc<dyn MetricStorage> {
        Arc::clone(&self.storage)
    }

    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }

    /// Start the periodic snapshot task when the file backend runs in periodic mode
    pub fn start_persistence_task(&self, shutdown_rx: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        self.file
            .as_ref()
            .and_then(|file| file.start_persistence_task(shutdown_rx))
    }

    pub async fn close(&self) -> Result<(), StorageError> {
        self.storage.close().await
    }
}

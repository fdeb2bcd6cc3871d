//! Storage error type
//!
//! One error type shared by the memory, file and database backends so the
//! HTTP layer can map failures without knowing which backend is active.

use tally::MetricError;
use thiserror::Error;

/// Errors raised by metric storage backends
#[derive(Error, Debug)]
pub enum StorageError {
    /// Rejected metric (empty id, kind mismatch, overflow)
    #[error("Invalid metric: {0}")]
    Metric(#[from] MetricError),

    /// Relational database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Snapshot file I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encode/decode error
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration failed
    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i64,
        name: String,
        error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation on a backend that has already been closed
    #[error("Storage is closed")]
    Closed,
}

impl StorageError {
    /// Create a migration failed error
    pub fn migration_failed(version: i64, name: &str, error: impl ToString) -> Self {
        Self::MigrationFailed {
            version,
            name: name.to_string(),
            error: error.to_string(),
        }
    }

    /// Whether the failure was caused by the caller's input rather than the backend
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::Metric(_))
    }
}

//! Relational storage backend
//!
//! One table per metric kind. Counter accumulation happens inside the
//! upsert statement, so concurrent updates to the same series never race a
//! read-then-write. Batches run in a single transaction.
//!
//! The DSN selects the driver: `postgres://` for deployments, `sqlite://`
//! for embedded use and tests.

mod migrations;
pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tally::{Metric, MetricError, MetricKind, SeriesKey};

use super::error::StorageError;
use super::traits::{MetricStorage, Snapshot};
use crate::core::constants::{DATABASE_ACQUIRE_TIMEOUT_SECS, DATABASE_MAX_CONNECTIONS};

pub struct DatabaseStorage {
    pool: AnyPool,
}

impl DatabaseStorage {
    /// Connect and migrate
    pub async fn init(dsn: &str) -> Result<Self, StorageError> {
        if dsn.is_empty() {
            return Err(StorageError::Config("database DSN is required".into()));
        }
        sqlx::any::install_default_drivers();

        // SQLite allows a single writer
        let max_connections = if dsn.starts_with("sqlite:") {
            1
        } else {
            DATABASE_MAX_CONNECTIONS
        };

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(DATABASE_ACQUIRE_TIMEOUT_SECS))
            .connect(dsn)
            .await?;

        migrations::run_migrations(&pool).await?;

        tracing::debug!(max_connections, "DatabaseStorage initialized");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Merge one metric and return the stored row
    async fn upsert<'c, E>(executor: E, metric: &Metric) -> Result<Metric, StorageError>
    where
        E: sqlx::Executor<'c, Database = sqlx::Any>,
    {
        metric.validate()?;
        match metric {
            Metric::Counter { id, delta } => {
                let stored: Option<i64> = sqlx::query_scalar(schema::UPSERT_COUNTER)
                    .bind(id.as_str())
                    .bind(*delta)
                    .fetch_optional(executor)
                    .await?;
                let delta = stored.ok_or_else(|| MetricError::Overflow { id: id.clone() })?;
                Ok(Metric::counter(id.as_str(), delta))
            }
            Metric::Gauge { id, value } => {
                let value: f64 = sqlx::query_scalar(schema::UPSERT_GAUGE)
                    .bind(id.as_str())
                    .bind(*value)
                    .fetch_one(executor)
                    .await?;
                Ok(Metric::gauge(id.as_str(), value))
            }
        }
    }

    async fn scan(
        &self,
        kind: MetricKind,
        snapshot: &Mutex<Snapshot>,
    ) -> Result<(), StorageError> {
        let query = match kind {
            MetricKind::Counter => schema::SELECT_ALL_COUNTERS,
            MetricKind::Gauge => schema::SELECT_ALL_GAUGES,
        };
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        for row in rows {
            let metric = metric_from_row(kind, &row)?;
            snapshot.lock().insert(SeriesKey::new(kind, metric.id()), metric);
        }
        Ok(())
    }
}

fn metric_from_row(kind: MetricKind, row: &AnyRow) -> Result<Metric, StorageError> {
    let id: String = row.try_get(0)?;
    Ok(match kind {
        MetricKind::Counter => Metric::counter(id, row.try_get::<i64, _>(1)?),
        MetricKind::Gauge => Metric::gauge(id, row.try_get::<f64, _>(1)?),
    })
}

#[async_trait]
impl MetricStorage for DatabaseStorage {
    async fn update(&self, metric: &Metric) -> Result<Metric, StorageError> {
        Self::upsert(&self.pool, metric).await
    }

    async fn update_batch(&self, metrics: &[Metric]) -> Result<(), StorageError> {
        if metrics.is_empty() {
            return Ok(());
        }
        // Dropping the transaction on error rolls it back
        let mut tx = self.pool.begin().await?;
        for metric in metrics {
            Self::upsert(&mut *tx, metric).await?;
        }
        tx.commit().await?;
        tracing::trace!(count = metrics.len(), "Batch committed");
        Ok(())
    }

    async fn get(&self, kind: MetricKind, id: &str) -> Result<Option<Metric>, StorageError> {
        let row = match kind {
            MetricKind::Counter => sqlx::query(schema::SELECT_COUNTER),
            MetricKind::Gauge => sqlx::query(schema::SELECT_GAUGE),
        }
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(match kind {
            MetricKind::Counter => Metric::counter(id, row.try_get::<i64, _>(0)?),
            MetricKind::Gauge => Metric::gauge(id, row.try_get::<f64, _>(0)?),
        }))
    }

    async fn get_all(&self) -> Result<Snapshot, StorageError> {
        let snapshot = Mutex::new(Snapshot::new());
        tokio::try_join!(
            self.scan(MetricKind::Counter, &snapshot),
            self.scan(MetricKind::Gauge, &snapshot),
        )?;
        Ok(snapshot.into_inner())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        if !self.pool.is_closed() {
            self.pool.close().await;
            tracing::debug!("Database pool closed");
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "database"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn open(dir: &tempfile::TempDir) -> DatabaseStorage {
        let dsn = format!("sqlite://{}?mode=rwc", dir.path().join("metrics.db").display());
        DatabaseStorage::init(&dsn).await.unwrap()
    }

    #[tokio::test]
    async fn test_counter_upsert_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        storage.update(&Metric::counter("hits", 5)).await.unwrap();
        storage.update(&Metric::counter("hits", 3)).await.unwrap();
        assert_eq!(
            storage.get(MetricKind::Counter, "hits").await.unwrap(),
            Some(Metric::counter("hits", 8))
        );
    }

    #[tokio::test]
    async fn test_gauge_upsert_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        storage.update(&Metric::gauge("temp", 10.0)).await.unwrap();
        storage.update(&Metric::gauge("temp", 7.5)).await.unwrap();
        assert_eq!(
            storage.get(MetricKind::Gauge, "temp").await.unwrap(),
            Some(Metric::gauge("temp", 7.5))
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        storage.update(&Metric::counter("cpu", 1)).await.unwrap();
        assert_eq!(storage.get(MetricKind::Gauge, "cpu").await.unwrap(), None);
        assert_eq!(storage.get(MetricKind::Counter, "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_invalid_row() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        storage.update(&Metric::counter("a", 10)).await.unwrap();

        let batch = vec![
            Metric::counter("a", 1),
            Metric::counter("b", 2),
            Metric::gauge("c", 3.0),
            Metric::gauge("d", 4.0),
            Metric::counter("", 5),
            Metric::counter("e", 6),
        ];
        assert!(storage.update_batch(&batch).await.is_err());

        let all = storage.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(
            storage.get(MetricKind::Counter, "a").await.unwrap(),
            Some(Metric::counter("a", 10))
        );
    }

    #[tokio::test]
    async fn test_update_returns_merged_row() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        assert_eq!(
            storage.update(&Metric::counter("hits", 5)).await.unwrap(),
            Metric::counter("hits", 5)
        );
        assert_eq!(
            storage.update(&Metric::counter("hits", -2)).await.unwrap(),
            Metric::counter("hits", 3)
        );
        assert_eq!(
            storage.update(&Metric::gauge("temp", 1.25)).await.unwrap(),
            Metric::gauge("temp", 1.25)
        );
    }

    #[tokio::test]
    async fn test_counter_overflow_rejected_and_series_kept() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        storage.update(&Metric::counter("c", i64::MAX)).await.unwrap();
        storage.update(&Metric::counter("n", i64::MIN)).await.unwrap();

        let err = storage.update(&Metric::counter("c", 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Metric(MetricError::Overflow { .. })));
        assert!(err.is_invalid_input());
        let err = storage.update(&Metric::counter("n", -1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Metric(MetricError::Overflow { .. })));

        assert_eq!(
            storage.get(MetricKind::Counter, "c").await.unwrap(),
            Some(Metric::counter("c", i64::MAX))
        );
        assert_eq!(storage.get_all().await.unwrap().len(), 2);

        // Moving back into range still works
        assert_eq!(
            storage.update(&Metric::counter("c", -1)).await.unwrap(),
            Metric::counter("c", i64::MAX - 1)
        );
        assert_eq!(
            storage.update(&Metric::counter("n", 1)).await.unwrap(),
            Metric::counter("n", i64::MIN + 1)
        );
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_failed_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        storage.update(&Metric::counter("a", 10)).await.unwrap();
        storage.update(&Metric::counter("big", i64::MAX)).await.unwrap();

        let batch = vec![
            Metric::counter("a", 1),
            Metric::counter("b", 2),
            Metric::gauge("c", 3.0),
            Metric::gauge("d", 4.0),
            Metric::counter("big", 1),
            Metric::counter("e", 6),
        ];
        let err = storage.update_batch(&batch).await.unwrap_err();
        assert!(matches!(err, StorageError::Metric(MetricError::Overflow { .. })));

        let all = storage.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            storage.get(MetricKind::Counter, "a").await.unwrap(),
            Some(Metric::counter("a", 10))
        );
        assert_eq!(storage.get(MetricKind::Counter, "b").await.unwrap(), None);
        assert_eq!(storage.get(MetricKind::Gauge, "c").await.unwrap(), None);
        assert_eq!(
            storage.get(MetricKind::Counter, "big").await.unwrap(),
            Some(Metric::counter("big", i64::MAX))
        );
    }

    #[tokio::test]
    async fn test_batch_commits_all() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        storage
            .update_batch(&[
                Metric::counter("c", 1),
                Metric::counter("c", 2),
                Metric::gauge("c", 0.5),
            ])
            .await
            .unwrap();
        storage.update_batch(&[]).await.unwrap();

        let all = storage.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            all.get(&SeriesKey::new(MetricKind::Counter, "c")),
            Some(&Metric::counter("c", 3))
        );
        assert_eq!(
            all.get(&SeriesKey::new(MetricKind::Gauge, "c")),
            Some(&Metric::gauge("c", 0.5))
        );
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        storage.update(&Metric::counter("kept", 1)).await.unwrap();
        storage.close().await.unwrap();

        let reopened = open(&dir).await;
        let versions: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
                .fetch_all(reopened.pool())
                .await
                .unwrap();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(
            reopened.get(MetricKind::Counter, "kept").await.unwrap(),
            Some(Metric::counter("kept", 1))
        );
    }

    #[tokio::test]
    async fn test_concurrent_counter_updates() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(open(&dir).await);
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move { storage.update(&Metric::counter("c", 1)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(
            storage.get(MetricKind::Counter, "c").await.unwrap(),
            Some(Metric::counter("c", 100))
        );
    }

    #[tokio::test]
    async fn test_ping_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir).await;
        storage.ping().await.unwrap();
        storage.close().await.unwrap();
        storage.close().await.unwrap();
        assert!(storage.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_dsn_is_config_error() {
        let err = DatabaseStorage::init("").await.err().unwrap();
        assert!(matches!(err, StorageError::Config(_)));
    }
}

//! Versioned schema migrations
//!
//! Applied migrations are recorded in `schema_migrations`; running against an
//! up-to-date database is a no-op.

use sqlx::AnyPool;

use super::schema::{MIGRATIONS, MIGRATIONS_TABLE, SCHEMA_VERSION};
use crate::data::StorageError;

/// Run all pending migrations
pub async fn run_migrations(pool: &AnyPool) -> Result<(), StorageError> {
    sqlx::query(MIGRATIONS_TABLE).execute(pool).await?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await?;

    let pending: Vec<_> = MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect();

    if pending.is_empty() {
        tracing::debug!("Metric schema is up to date (v{})", SCHEMA_VERSION);
        return Ok(());
    }

    for migration in pending {
        let start = std::time::Instant::now();
        let mut tx = pool.begin().await?;

        sqlx::query(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::migration_failed(migration.version, migration.name, e))?;

        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES ($1, $2, $3)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            version = migration.version,
            name = migration.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Applied migration"
        );
    }

    Ok(())
}

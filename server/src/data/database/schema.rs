//! Relational schema
//!
//! Portable DDL: the same statements run on PostgreSQL and SQLite.

/// Migration bookkeeping table
pub const MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at BIGINT NOT NULL
)
"#;

/// A versioned schema change
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// All migrations, in version order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_counter",
        sql: r#"
CREATE TABLE IF NOT EXISTS counter (
    id TEXT PRIMARY KEY CHECK (id <> ''),
    delta BIGINT NOT NULL
)
"#,
    },
    Migration {
        version: 2,
        name: "create_gauge",
        sql: r#"
CREATE TABLE IF NOT EXISTS gauge (
    id TEXT PRIMARY KEY CHECK (id <> ''),
    value DOUBLE PRECISION NOT NULL
)
"#,
    },
];

/// Latest schema version
pub const SCHEMA_VERSION: i64 = 2;

/// Accumulating upsert; the conflict update is skipped when the sum would leave
/// the BIGINT range, so no row comes back
pub const UPSERT_COUNTER: &str = "INSERT INTO counter (id, delta) VALUES ($1, $2) \
     ON CONFLICT (id) DO UPDATE SET delta = counter.delta + EXCLUDED.delta \
     WHERE CASE WHEN EXCLUDED.delta >= 0 \
         THEN counter.delta <= 9223372036854775807 - EXCLUDED.delta \
         ELSE counter.delta >= -9223372036854775807 - 1 - EXCLUDED.delta END \
     RETURNING delta";

pub const UPSERT_GAUGE: &str = "INSERT INTO gauge (id, value) VALUES ($1, $2) \
     ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value \
     RETURNING value";

pub const SELECT_COUNTER: &str = "SELECT delta FROM counter WHERE id = $1";
pub const SELECT_GAUGE: &str = "SELECT value FROM gauge WHERE id = $1";
pub const SELECT_ALL_COUNTERS: &str = "SELECT id, delta FROM counter";
pub const SELECT_ALL_GAUGES: &str = "SELECT id, value FROM gauge";

// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "tally_server";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file looked up in the working directory when no path is given
pub const CONFIG_FILE_NAME: &str = "tally-server.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "CONFIG";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "TALLY_LOG";

/// Environment variable for the bind address
pub const ENV_ADDRESS: &str = "ADDRESS";

/// Environment variable for the snapshot interval in seconds
pub const ENV_STORE_INTERVAL: &str = "STORE_INTERVAL";

/// Environment variable for the snapshot file path
pub const ENV_FILE_STORAGE_PATH: &str = "FILE_STORAGE_PATH";

/// Environment variable for restoring the snapshot on start
pub const ENV_RESTORE: &str = "RESTORE";

/// Environment variable for the database DSN
pub const ENV_DATABASE_DSN: &str = "DATABASE_DSN";

/// Environment variable for the payload signing key
pub const ENV_KEY: &str = "KEY";

// =============================================================================
// Defaults
// =============================================================================

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "localhost:8080";

/// Default snapshot interval in seconds (0 = save on every update)
pub const DEFAULT_STORE_INTERVAL_SECS: u64 = 300;

/// Default snapshot file path
pub const DEFAULT_FILE_STORAGE_PATH: &str = "/tmp/metrics-db.json";

/// Restore the snapshot on start by default
pub const DEFAULT_RESTORE: bool = true;

// =============================================================================
// HTTP
// =============================================================================

/// Upper bound for every storage call made by a request handler
pub const REQUEST_TIMEOUT_SECS: u64 = 1;

/// Maximum accepted request body size (after decompression)
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// Database
// =============================================================================

/// Connection pool size for PostgreSQL
pub const DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Seconds to wait for a pooled connection
pub const DATABASE_ACQUIRE_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum seconds to wait for background tasks on shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

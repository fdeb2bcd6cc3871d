// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "tally_agent";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file looked up in the working directory when no path is given
pub const CONFIG_FILE_NAME: &str = "tally-agent.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "CONFIG";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "TALLY_LOG";

/// Environment variable for the server address
pub const ENV_ADDRESS: &str = "ADDRESS";

/// Environment variable for the poll interval in seconds
pub const ENV_POLL_INTERVAL: &str = "POLL_INTERVAL";

/// Environment variable for the report interval in seconds
pub const ENV_REPORT_INTERVAL: &str = "REPORT_INTERVAL";

/// Environment variable for batch delivery
pub const ENV_BATCH_MODE: &str = "BATCH_MODE";

/// Environment variable for the payload signing key
pub const ENV_KEY: &str = "KEY";

/// Environment variable for the number of delivery workers
pub const ENV_RATE_LIMIT: &str = "RATE_LIMIT";

/// Environment variable for talking HTTPS to the server
pub const ENV_USE_HTTPS: &str = "USE_HTTPS";

/// Environment variable for gzip request bodies
pub const ENV_COMPRESS: &str = "COMPRESS";

// =============================================================================
// Defaults
// =============================================================================

/// Default server address
pub const DEFAULT_ADDRESS: &str = "localhost:8080";

/// Default poll interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default report interval in seconds
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 10;

/// Send whole slices to `/updates/` by default
pub const DEFAULT_BATCH_MODE: bool = true;

/// Default number of delivery workers
pub const DEFAULT_RATE_LIMIT: usize = 1;

/// Compress request bodies by default
pub const DEFAULT_COMPRESS: bool = true;

// =============================================================================
// Pipeline
// =============================================================================

/// Collector to aggregator channel capacity (in poll batches)
pub const INGEST_QUEUE_CAPACITY: usize = 16;

/// Aggregator to worker pool queue capacity (in send tasks)
pub const TASK_QUEUE_CAPACITY: usize = 100;

/// Per-request HTTP timeout in seconds
pub const HTTP_TIMEOUT_SECS: u64 = 5;

/// Retries after the first failed attempt
pub const RETRY_COUNT: u32 = 3;

/// First backoff wait in milliseconds
pub const RETRY_INITIAL_WAIT_MS: u64 = 2_000;

/// Backoff wait ceiling in milliseconds
pub const RETRY_MAX_WAIT_MS: u64 = 5_000;

// =============================================================================
// Metric Names
// =============================================================================

pub const POLL_COUNT: &str = "PollCount";
pub const RANDOM_VALUE: &str = "RandomValue";

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum seconds to wait for pipeline tasks on shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

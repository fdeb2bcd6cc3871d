use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_ADDRESS, DEFAULT_BATCH_MODE, DEFAULT_COMPRESS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_RATE_LIMIT, DEFAULT_REPORT_INTERVAL_SECS, RETRY_COUNT,
    RETRY_INITIAL_WAIT_MS, RETRY_MAX_WAIT_MS,
};
use crate::delivery::{DeliveryMode, RetryPolicy};

// =============================================================================
// File Config (JSON deserialization)
// =============================================================================

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub address: Option<String>,
    pub poll_interval: Option<u64>,
    pub report_interval: Option<u64>,
    pub batch_mode: Option<bool>,
    pub key: Option<String>,
    pub rate_limit: Option<usize>,
    pub use_https: Option<bool>,
    pub compress: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Resolved Config
// =============================================================================

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// `host:port` of the collector service
    pub address: String,
    pub use_https: bool,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub mode: DeliveryMode,
    /// Shared signing key; `None` sends unsigned payloads
    pub key: Option<Arc<str>>,
    /// Worker count, also the number of slices per flushed batch
    pub rate_limit: usize,
    pub compress: bool,
    pub retry: RetryPolicy,
}

impl AgentConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. CLI-specified config path OR local `tally-agent.json`
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::trace!(
            address = ?cli.address,
            poll_interval = ?cli.poll_interval,
            report_interval = ?cli.report_interval,
            "CLI config"
        );

        let file_path = match &cli.config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.clone())
            }
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                local.exists().then_some(local)
            }
        };

        let file_config = match file_path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                config
            }
            None => FileConfig::default(),
        };

        let config = Self::layer(cli, file_config)?;
        config.validate()?;

        tracing::debug!(
            server = %config.server_url(),
            poll_interval_secs = config.poll_interval.as_secs(),
            report_interval_secs = config.report_interval.as_secs(),
            mode = ?config.mode,
            rate_limit = config.rate_limit,
            compress = config.compress,
            signing = config.key.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn layer(cli: &CliConfig, file: FileConfig) -> Result<Self> {
        let address = cli
            .address
            .clone()
            .or(file.address)
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

        let poll_interval = cli
            .poll_interval
            .or(file.poll_interval)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        let report_interval = cli
            .report_interval
            .or(file.report_interval)
            .unwrap_or(DEFAULT_REPORT_INTERVAL_SECS);

        if poll_interval == 0 || report_interval == 0 {
            anyhow::bail!("Configuration error: poll and report intervals must be positive");
        }

        let batch_mode = cli
            .batch_mode
            .or(file.batch_mode)
            .unwrap_or(DEFAULT_BATCH_MODE);

        let key = cli
            .key
            .clone()
            .or(file.key)
            .filter(|k| !k.trim().is_empty())
            .map(Arc::from);

        Ok(Self {
            address,
            use_https: cli.use_https.or(file.use_https).unwrap_or(false),
            poll_interval: Duration::from_secs(poll_interval),
            report_interval: Duration::from_secs(report_interval),
            mode: if batch_mode {
                DeliveryMode::Batch
            } else {
                DeliveryMode::Individual
            },
            key,
            rate_limit: cli
                .rate_limit
                .or(file.rate_limit)
                .unwrap_or(DEFAULT_RATE_LIMIT),
            compress: cli.compress.or(file.compress).unwrap_or(DEFAULT_COMPRESS),
            retry: RetryPolicy {
                retries: RETRY_COUNT,
                initial_wait: Duration::from_millis(RETRY_INITIAL_WAIT_MS),
                max_wait: Duration::from_millis(RETRY_MAX_WAIT_MS),
            },
        })
    }

    fn validate(&self) -> Result<()> {
        tally::address::split_host_port(&self.address)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

        if self.rate_limit == 0 {
            anyhow::bail!("Configuration error: rate limit must be at least 1");
        }

        Ok(())
    }

    /// Base URL of the collector service, without a trailing slash
    pub fn server_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{}://{}", scheme, self.address)
    }
}

use clap::Parser;

use std::path::PathBuf;

use super::constants::{
    ENV_ADDRESS, ENV_BATCH_MODE, ENV_COMPRESS, ENV_CONFIG, ENV_KEY, ENV_POLL_INTERVAL,
    ENV_RATE_LIMIT, ENV_REPORT_INTERVAL, ENV_USE_HTTPS,
};

#[derive(Parser)]
#[command(name = "tally-agent")]
#[command(version, about = "Runtime and host metrics agent", long_about = None)]
pub struct Cli {
    /// Server address (host:port)
    #[arg(long, short = 'a', env = ENV_ADDRESS)]
    pub address: Option<String>,

    /// Seconds between metric samples
    #[arg(long, short = 'p', env = ENV_POLL_INTERVAL)]
    pub poll_interval: Option<u64>,

    /// Seconds between deliveries
    #[arg(long, short = 'r', env = ENV_REPORT_INTERVAL)]
    pub report_interval: Option<u64>,

    /// Send one batch per slice instead of one request per metric
    #[arg(long, short = 'b', env = ENV_BATCH_MODE, num_args = 0..=1, default_missing_value = "true")]
    pub batch_mode: Option<bool>,

    /// Shared key for HMAC-SHA256 payload signatures
    #[arg(long, short = 'k', env = ENV_KEY, hide_env_values = true)]
    pub key: Option<String>,

    /// Number of concurrent delivery workers
    #[arg(long, short = 'l', env = ENV_RATE_LIMIT)]
    pub rate_limit: Option<usize>,

    /// Use https:// for the server URL
    #[arg(long, env = ENV_USE_HTTPS, num_args = 0..=1, default_missing_value = "true")]
    pub use_https: Option<bool>,

    /// Gzip request bodies
    #[arg(long, env = ENV_COMPRESS, num_args = 0..=1, default_missing_value = "true")]
    pub compress: Option<bool>,

    /// Path to config file
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,
}

/// CLI configuration values
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub address: Option<String>,
    pub poll_interval: Option<u64>,
    pub report_interval: Option<u64>,
    pub batch_mode: Option<bool>,
    pub key: Option<String>,
    pub rate_limit: Option<usize>,
    pub use_https: Option<bool>,
    pub compress: Option<bool>,
    pub config: Option<PathBuf>,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            address: cli.address,
            poll_interval: cli.poll_interval,
            report_interval: cli.report_interval,
            batch_mode: cli.batch_mode,
            key: cli.key,
            rate_limit: cli.rate_limit,
            use_https: cli.use_https,
            compress: cli.compress,
            config: cli.config,
        }
    }
}

/// Parse CLI arguments
pub fn parse() -> CliConfig {
    Cli::parse().into()
}

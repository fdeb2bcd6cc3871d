use clap::Parser;

use std::path::PathBuf;

use super::constants::{
    ENV_ADDRESS, ENV_CONFIG, ENV_DATABASE_DSN, ENV_FILE_STORAGE_PATH, ENV_KEY, ENV_RESTORE,
    ENV_STORE_INTERVAL,
};

#[derive(Parser)]
#[command(name = "tally-server")]
#[command(version, about = "Metrics collection server", long_about = None)]
pub struct Cli {
    /// Address to listen on (host:port)
    #[arg(long, short = 'a', env = ENV_ADDRESS)]
    pub address: Option<String>,

    /// Snapshot interval in seconds (0 = save on every update)
    #[arg(long, short = 'i', env = ENV_STORE_INTERVAL)]
    pub store_interval: Option<u64>,

    /// Snapshot file path (empty disables the file backend)
    #[arg(long, short = 'f', env = ENV_FILE_STORAGE_PATH)]
    pub file_storage_path: Option<String>,

    /// Restore metrics from the snapshot file on start
    #[arg(long, short = 'r', env = ENV_RESTORE)]
    pub restore: Option<bool>,

    /// Database DSN; takes precedence over the snapshot file
    #[arg(long, short = 'd', env = ENV_DATABASE_DSN)]
    pub database_dsn: Option<String>,

    /// Shared key for HMAC-SHA256 payload signatures
    #[arg(long, short = 'k', env = ENV_KEY, hide_env_values = true)]
    pub key: Option<String>,

    /// Path to config file
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,
}

/// CLI configuration values
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub address: Option<String>,
    pub store_interval: Option<u64>,
    pub file_storage_path: Option<String>,
    pub restore: Option<bool>,
    pub database_dsn: Option<String>,
    pub key: Option<String>,
    pub config: Option<PathBuf>,
}

/// Parse CLI arguments
pub fn parse() -> CliConfig {
    let cli = Cli::parse();
    CliConfig {
        address: cli.address,
        store_interval: cli.store_interval,
        file_storage_path: cli.file_storage_path,
        restore: cli.restore,
        database_dsn: cli.database_dsn,
        key: cli.key,
        config: cli.config,
    }
}

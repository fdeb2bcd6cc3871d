//! Agent application

use anyhow::{Context, Result};

use crate::core::cli;
use crate::core::config::AgentConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::pipeline::Pipeline;

pub struct AgentApp;

impl AgentApp {
    /// Run the agent with CLI argument parsing until a shutdown signal arrives
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Agent starting");

        let cli_config = cli::parse();
        let config = AgentConfig::load(&cli_config)?;

        let pipeline = Pipeline::start(&config).context("Failed to start metrics pipeline")?;
        pipeline.install_signal_handlers();

        tracing::info!(
            server = %config.server_url(),
            mode = ?config.mode,
            workers = config.rate_limit,
            "Agent running"
        );

        pipeline.token().cancelled().await;
        pipeline.shutdown().await;

        tracing::debug!("Shutdown complete");
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}

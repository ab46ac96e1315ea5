//! CLI command implementations

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{debug, info};

pub mod comments;
pub mod error;
pub mod get;

pub use comments::CommentsCommand;
pub use error::CliError;
pub use get::GetCommand;

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::shutdown::SharedShutdown;

/// Reddit account data dumper
#[derive(Parser, Debug)]
#[command(name = "reddit-dump", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// Wait once when the API asks to slow down (overrides the config file)
    #[arg(long, global = true, default_value_t = false)]
    pub retry_on_wait: bool,

    /// Extra attempts on server and network errors (overrides the config file)
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub retry_on_server_error: Option<u32>,

    /// Seconds between attempts (overrides the config file)
    #[arg(long, global = true, value_parser = parse_delay)]
    pub retry_delay: Option<f64>,

    /// User-Agent header (overrides the config file)
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dump every comment of a user into a JSON file
    Comments(CommentsCommand),

    /// Perform one authenticated GET and print the response body
    Get(GetCommand),
}

/// Parse and validate a delay in seconds
fn parse_delay(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("delay must be a non-negative number, got {value}"));
    }
    Ok(value)
}

impl Cli {
    /// Load the configuration file and apply command-line overrides
    ///
    /// # Errors
    /// Returns [`CliError::ConfigError`] if the file is missing, malformed,
    /// or the merged values are invalid.
    pub fn load_config(&self) -> Result<ClientConfig, CliError> {
        let config = ClientConfig::from_file(&self.config)?;
        let config = self.apply_overrides(config);
        config.validate()?;
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Overlay command-line values on a loaded configuration
    pub fn apply_overrides(&self, mut config: ClientConfig) -> ClientConfig {
        if self.retry_on_wait {
            config.retry_on_wait = true;
        }
        if let Some(retries) = self.retry_on_server_error {
            config.retry_on_server_error = retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay = delay;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }

    /// Run the selected command
    ///
    /// # Errors
    /// Returns the first configuration, API or output error
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<(), CliError> {
        let config = self.load_config()?;

        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::MetricsError(e.to_string()))?;
        }

        let client = ApiClient::from_config(&config)?;
        info!(username = %config.username, "Client ready");

        match &self.command {
            Commands::Comments(cmd) => {
                cmd.execute(&client, &config.username, shutdown).await?;
            }
            Commands::Get(cmd) => cmd.execute(&client, shutdown).await?,
        }
        Ok(())
    }
}

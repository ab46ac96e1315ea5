//! CLI error types and conversions

use crate::client::ApiError;
use crate::config::ConfigError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// API call failed terminally
    #[error("api request failed: {0}")]
    ApiError(#[from] ApiError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Metrics exporter could not be started
    #[error("metrics error: {0}")]
    MetricsError(String),

    /// Stopped by Ctrl+C
    #[error("interrupted after {pages} page(s)")]
    Interrupted {
        /// Pages written before the interruption
        pages: u64,
    },
}

//! `get` command: one authenticated GET, body printed to stdout

use clap::Args;
use serde_json::Value;
use tracing::warn;

use super::CliError;
use crate::client::{ApiClient, Payload};
use crate::shutdown::SharedShutdown;

/// Get command arguments
#[derive(Args, Debug)]
pub struct GetCommand {
    /// Endpoint path relative to the API base, e.g. /api/v1/me
    pub endpoint: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "param", short = 'p', value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

/// Parse a `key=value` query parameter
fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("'{s}' is not in key=value form"))?;
    if key.is_empty() {
        return Err(format!("'{s}' has an empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}

impl GetCommand {
    /// Query payload built from the repeated `--param` flags
    pub fn query(&self) -> Option<Payload> {
        if self.params.is_empty() {
            return None;
        }
        Some(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Send the request and print the body
    ///
    /// # Errors
    /// Returns the terminal API error, or [`CliError::Interrupted`] on Ctrl+C
    pub async fn execute(&self, client: &ApiClient, shutdown: SharedShutdown) -> Result<(), CliError> {
        if !self.endpoint.starts_with('/') {
            return Err(CliError::InvalidArgument(format!(
                "endpoint must start with '/': {}",
                self.endpoint
            )));
        }

        let response = tokio::select! {
            response = client.get(&self.endpoint, self.query()) => response?,
            _ = shutdown.wait_for_shutdown() => {
                warn!(endpoint = %self.endpoint, "Interrupted");
                return Err(CliError::Interrupted { pages: 0 });
            }
        };

        let rendered = serde_json::to_string_pretty(&response.body)
            .unwrap_or_else(|_| response.body.to_string());
        println!("{rendered}");
        Ok(())
    }
}

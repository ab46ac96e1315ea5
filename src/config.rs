//! Client configuration
//!
//! Loaded from a JSON file and optionally overridden from the command line.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::client::orchestrator::ClientOptions;
use crate::client::Credentials;

/// Default API base for authenticated calls
pub const DEFAULT_API_BASE_URL: &str = "https://oauth.reddit.com";

/// Default token exchange endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Default User-Agent header
pub const DEFAULT_USER_AGENT: &str = "reddit-dump";

/// Default delay between attempts, in seconds
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 5.0;

/// Items requested per listing page (the API maximum)
pub const PAGE_LIMIT: u32 = 100;

/// Page cap for one pagination session.
/// Guards against a server that keeps returning a cursor.
pub const MAX_PAGES: u64 = 10_000;

/// TCP connect timeout for every request
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Whole-request timeout for every request
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid configuration JSON
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed
        path: String,
        /// Underlying error
        source: serde_json::Error,
    },

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Account, application and retry settings
#[derive(Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
    /// Current one-time code for accounts with two-factor auth
    #[serde(default, alias = "TOTP", deserialize_with = "deserialize_totp")]
    pub totp: Option<String>,
    /// Application id
    pub app_id: String,
    /// Application secret
    pub app_secret: String,
    /// User-Agent header for every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Wait once when the server sends a rate-limit hint
    #[serde(default)]
    pub retry_on_wait: bool,
    /// Extra attempts on 5xx and network failures
    #[serde(default)]
    pub retry_on_server_error: u32,
    /// Seconds between attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    /// Let the retry engine repeat 403s before refreshing the token
    #[serde(default)]
    pub retry_on_403_in_transport: bool,
    /// API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Token exchange URL
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_retry_delay() -> f64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

/// One-time codes are digits, so config files carry them as strings or numbers
fn deserialize_totp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(code) => Ok(Some(code)),
        Value::Number(code) => Ok(Some(code.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "totp must be a string or a number, got {other}"
        ))),
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("username", &self.username)
            .field("app_id", &self.app_id)
            .field("user_agent", &self.user_agent)
            .field("retry_on_wait", &self.retry_on_wait)
            .field("retry_on_server_error", &self.retry_on_server_error)
            .field("retry_delay", &self.retry_delay)
            .field("retry_on_403_in_transport", &self.retry_on_403_in_transport)
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Minimal configuration with defaults for everything but credentials
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            totp: None,
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            user_agent: default_user_agent(),
            retry_on_wait: false,
            retry_on_server_error: 0,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            retry_on_403_in_transport: false,
            api_base_url: default_api_base_url(),
            token_url: default_token_url(),
        }
    }

    /// Parse configuration from a JSON string
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed JSON or missing credentials,
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first bad value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid("username must not be empty".into()));
        }
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::Invalid("app_id must not be empty".into()));
        }
        if !self.retry_delay.is_finite() || self.retry_delay < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "retry_delay must be a non-negative number of seconds, got {}",
                self.retry_delay
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".into()));
        }
        Ok(())
    }

    /// Delay between attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_delay).unwrap_or_default()
    }

    /// Credentials for the token exchange
    ///
    /// With a one-time code set, the password becomes `"{password}:{totp}"`.
    pub fn credentials(&self) -> Credentials {
        let password = match self.totp.as_deref().filter(|code| !code.is_empty()) {
            Some(code) => format!("{}:{}", self.password, code),
            None => self.password.clone(),
        };
        Credentials::new(
            self.username.clone(),
            password,
            self.app_id.clone(),
            self.app_secret.clone(),
        )
    }

    /// Retry policy for resource calls
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            retry_on_wait: self.retry_on_wait,
            retry_on_server_error: self.retry_on_server_error,
            retry_delay: self.retry_delay(),
            retry_on_403_in_transport: self.retry_on_403_in_transport,
        }
    }
}

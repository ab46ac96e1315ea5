//! Retry message formatting
//!
//! Keeps retry and failure log lines consistent across the retry engine and
//! the token exchange: attempt counters, a readable cause, the endpoint, and
//! a short list of suggestions once the budget is spent.

use std::time::Duration;

use super::transport::{TransportError, TransportErrorKind};
use super::HttpMethod;

/// Classification of retry causes for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// HTTP 5xx server error
    ServerError(u16),
    /// HTTP 403, usually an expired token
    AuthExpired,
    /// Generic fallback when no better classification fits
    NetworkGeneric,
}

impl RetryErrorType {
    /// User-friendly description string used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::AuthExpired => "authorization expired (403)",
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation presented after the budget is spent.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection and firewall settings",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::ServerError(_) => "The API may be experiencing issues, try again later",
            Self::AuthExpired => "Verify the account credentials and the app's access",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub error_type: RetryErrorType,
    /// Delay until next attempt
    pub delay: Duration,
    /// HTTP verb of the failing call
    pub method: HttpMethod,
    /// URL or endpoint that failed
    pub endpoint: String,
}

impl RetryContext {
    /// Convenience constructor used throughout the retry logic.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        delay: Duration,
        method: HttpMethod,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            delay,
            method,
            endpoint: endpoint.into(),
        }
    }

    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying {} {} (attempt {}/{}) after {} - waiting {:.1} seconds...",
            self.method,
            self.endpoint,
            self.attempt,
            self.max_attempts,
            self.error_type.description(),
            self.delay.as_secs_f64()
        )
    }

    /// Format final failure summary with actionable suggestions.
    pub fn format_failure(&self) -> String {
        let mut lines = vec![
            format!(
                "[FAILED] {} {} failed after {} attempt(s)",
                self.method, self.endpoint, self.max_attempts
            ),
            format!("  Last error: {}", self.error_type.description()),
            "  Suggestions:".to_string(),
        ];

        for suggestion in self.format_suggestions() {
            lines.push(format!("    - {suggestion}"));
        }

        lines.join("\n")
    }

    /// Derive suggestions tailored to the current retry context.
    pub fn format_suggestions(&self) -> Vec<String> {
        vec![
            self.error_type.suggestion().to_string(),
            format!(
                "Try increasing retry_on_server_error (current attempts: {})",
                self.max_attempts
            ),
        ]
    }
}

/// Extract a [`RetryErrorType`] from a status code or transport error.
pub fn extract_error_type(
    status: Option<u16>,
    err: Option<&TransportError>,
) -> RetryErrorType {
    if let Some(status) = status {
        if status == 403 {
            return RetryErrorType::AuthExpired;
        }
        if (500..600).contains(&status) {
            return RetryErrorType::ServerError(status);
        }
    }

    match err.map(|e| e.kind) {
        Some(TransportErrorKind::Timeout) => RetryErrorType::NetworkTimeout,
        Some(TransportErrorKind::Connect) => RetryErrorType::NetworkOffline,
        _ => RetryErrorType::NetworkGeneric,
    }
}

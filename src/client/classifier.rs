//! Response classification by status family
//!
//! Pure mapping from a transport response to an [`Outcome`]. The only body
//! inspection is the in-band rate-limit hint the API nests inside some 2xx
//! envelopes: `{"json": {"ratelimit": <seconds>}}`.

use serde_json::Value;
use std::time::Duration;

use super::transport::RawResponse;

/// Classified result of one transport attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 1xx, 2xx without rate-limit hint, or 3xx
    Success {
        /// Status code
        status: u16,
        /// Parsed body
        body: Value,
    },
    /// 2xx whose body asks the caller to wait
    RateLimited {
        /// Advertised wait
        retry_after: Duration,
    },
    /// 5xx
    ServerError {
        /// Status code
        status: u16,
        /// Parsed body
        body: Value,
    },
    /// 4xx; a 403 usually means the token expired
    ClientError {
        /// Status code
        status: u16,
        /// Parsed body
        body: Value,
    },
    /// Status outside 1xx-5xx
    Unknown {
        /// Status code
        status: u16,
        /// Parsed body
        body: Value,
    },
}

impl Outcome {
    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::RateLimited { .. } => "rate_limited",
            Outcome::ServerError { .. } => "server_error",
            Outcome::ClientError { .. } => "client_error",
            Outcome::Unknown { .. } => "unknown",
        }
    }
}

/// Classify a response by `status / 100`
pub fn classify(response: RawResponse) -> Outcome {
    let RawResponse { status, body } = response;

    match status / 100 {
        1 | 3 => Outcome::Success { status, body },
        2 => match rate_limit_hint(&body) {
            Some(retry_after) => Outcome::RateLimited { retry_after },
            None => Outcome::Success { status, body },
        },
        4 => Outcome::ClientError { status, body },
        5 => Outcome::ServerError { status, body },
        _ => Outcome::Unknown { status, body },
    }
}

/// Extract a positive `json.ratelimit` value in seconds
///
/// Zero, negative, non-numeric and out-of-range values are not a hint.
pub fn rate_limit_hint(body: &Value) -> Option<Duration> {
    let seconds = body.get("json")?.get("ratelimit")?.as_f64()?;
    if seconds <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

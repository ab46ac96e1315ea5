//! Authenticated API client
//!
//! The client turns one logical call into as many transport attempts as the
//! configured policy allows:
//!
//! 1. [`token::TokenManager`] hands out a cached bearer token, exchanging
//!    credentials when the cache is empty or expired
//! 2. [`retry::RetryEngine`] runs the transport call, repeating it on server
//!    errors and network failures with a fixed delay
//! 3. [`classifier::classify`] maps the final response to an [`classifier::Outcome`]
//! 4. [`orchestrator::ApiClient`] decides whether to return, wait for a
//!    rate-limit hint, refresh the token, or fail
//!
//! [`pagination::Paginator`] sits on top and follows listing cursors.

use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

pub mod classifier;
pub mod orchestrator;
pub mod pagination;
pub mod retry;
pub mod retry_formatter;
pub mod token;
pub mod transport;
pub mod waiter;

pub use classifier::{classify, Outcome};
pub use orchestrator::{ApiClient, ClientOptions};
pub use pagination::{PaginationCursor, Paginator};
pub use retry::{RetryBudget, RetryEngine, RetryError};
pub use token::{Credentials, Token, TokenManager};
pub use transport::{HttpTransport, RawResponse};
pub use waiter::{TokioWaiter, Waiter};

/// Terminal client errors
///
/// Every variant ends the logical call. Single 403s and server errors inside
/// the retry budget are handled internally and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Token exchange rejected the credentials (4xx)
    #[error("authentication failed with status {status}: {body}")]
    AuthenticationFailed {
        /// Status returned by the token endpoint
        status: u16,
        /// Response body, as parsed
        body: Value,
    },

    /// Two consecutive 403 responses for the same logical call
    #[error("received two 403 responses in a row for {endpoint}, not retrying again")]
    AuthorizationExpiredTwice {
        /// Endpoint that kept refusing the token
        endpoint: String,
    },

    /// Server asked to wait but policy forbade it or the hint repeated
    #[error("rate limited, try again in {} seconds", .retry_after.as_secs_f64())]
    RateLimitExceeded {
        /// Wait advertised by the server
        retry_after: Duration,
    },

    /// 5xx after exhausting the retry budget
    #[error("server error {status} after {attempts} attempt(s)")]
    ServerUnavailable {
        /// Last observed status
        status: u16,
        /// Transport attempts made
        attempts: u32,
    },

    /// Network failure on every attempt
    #[error("transport failure after {attempts} attempt(s): {message}")]
    TransportFailure {
        /// Transport attempts made
        attempts: u32,
        /// Last transport error
        message: String,
    },

    /// Any other 4xx on a resource call
    #[error("request rejected with status {status}: {body}")]
    RequestRejected {
        /// Status returned
        status: u16,
        /// Response body, as parsed
        body: Value,
    },

    /// Status code outside 1xx-5xx
    #[error("unexpected response status {status}")]
    UnexpectedResponse {
        /// Status returned
        status: u16,
    },

    /// Pagination did not terminate within the page cap
    #[error("pagination exceeded {pages} pages without reaching the end")]
    PaginationLimitExceeded {
        /// Pages fetched before giving up
        pages: u64,
    },

    /// The request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for client operations
pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP verbs accepted by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET, payload sent as query string
    Get,
    /// POST, payload sent form-encoded
    Post,
    /// PUT, payload sent as JSON
    Put,
    /// PATCH, payload sent as JSON
    Patch,
    /// DELETE, payload sent as JSON
    Delete,
}

impl HttpMethod {
    /// Upper-case verb
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request payload: a flat JSON object
pub type Payload = Map<String, Value>;

/// One logical request, immutable for the duration of the call
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// Path relative to the API base (e.g. "/api/v1/me")
    pub endpoint: String,
    /// HTTP verb
    pub method: HttpMethod,
    /// Optional payload, encoded according to `method`
    pub payload: Option<Payload>,
}

impl RequestSpec {
    /// Request without payload
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            payload: None,
        }
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Payload as string pairs, for query strings and form bodies
    ///
    /// String values are sent as-is, everything else uses its JSON rendering.
    /// Null values are dropped.
    pub fn payload_pairs(&self) -> Vec<(String, String)> {
        self.payload
            .iter()
            .flat_map(|payload| payload.iter())
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// Successful result of a logical call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Final status code (1xx, 2xx or 3xx)
    pub status: u16,
    /// Parsed body, or the raw text as a JSON string when it was not JSON
    pub body: Value,
}

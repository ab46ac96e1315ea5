//! HTTP transport (one attempt per call)
//!
//! Wraps a `reqwest::Client` and performs exactly one request per method
//! call. Bodies are parsed as JSON when possible and kept as raw text
//! otherwise; status handling is left to the classifier.

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use super::token::Credentials;
use super::{ApiError, ApiResult, HttpMethod, RequestSpec};
use crate::config::{HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS};
use crate::metrics::HttpRequestMetrics;
use std::time::Duration;

/// Status and parsed body of one transport attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// JSON body, the raw text as a JSON string, or `Null` when empty
    pub body: Value,
}

/// Coarse kind of a network-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Request or connect timeout
    Timeout,
    /// Connection could not be established
    Connect,
    /// Anything else (TLS, body read, protocol)
    Other,
}

/// Network-level failure: no usable response was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Failure kind
    pub kind: TransportErrorKind,
    /// Underlying error message
    pub message: String,
}

impl TransportError {
    /// Create a transport error
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Reqwest-backed transport bound to one API base and token endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    api_base_url: String,
    token_url: String,
    user_agent: String,
}

impl HttpTransport {
    /// Build a transport with the default connect/request timeouts
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidRequest`] if the HTTP client cannot be built
    pub fn new(
        api_base_url: impl Into<String>,
        token_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, api_base_url, token_url, user_agent))
    }

    /// Build a transport around an existing client
    pub fn with_client(
        client: Client,
        api_base_url: impl Into<String>,
        token_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into(),
            user_agent: user_agent.into(),
        }
    }

    /// API base URL, without trailing slash
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Token exchange URL
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Perform one resource request with the given Authorization value
    ///
    /// GET payloads go in the query string, POST payloads are form-encoded,
    /// PUT/PATCH/DELETE payloads are sent as JSON.
    pub async fn send(
        &self,
        spec: &RequestSpec,
        authorization: &str,
    ) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.api_base_url, spec.endpoint);
        let mut request = self
            .client
            .request(spec.method.into(), &url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::USER_AGENT, &self.user_agent);

        request = match spec.method {
            HttpMethod::Get => request.query(&spec.payload_pairs()),
            HttpMethod::Post => match spec.payload {
                Some(_) => request.form(&spec.payload_pairs()),
                None => request,
            },
            HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete => match &spec.payload {
                Some(payload) => request.json(payload),
                None => request,
            },
        };

        debug!(method = %spec.method, endpoint = %spec.endpoint, "Making request");
        self.execute(request, spec.method, &spec.endpoint).await
    }

    /// Perform one password-grant token exchange
    ///
    /// Client credentials travel as HTTP basic auth, the user's credentials
    /// as a form body.
    pub async fn exchange(&self, credentials: &Credentials) -> Result<RawResponse, TransportError> {
        let form = [
            ("grant_type", "password"),
            ("username", credentials.username()),
            ("password", credentials.password()),
        ];

        let request = self
            .client
            .post(&self.token_url)
            .basic_auth(credentials.client_id(), Some(credentials.client_secret()))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .form(&form);

        debug!(endpoint = %self.token_url, "Requesting access token");
        self.execute(request, HttpMethod::Post, &self.token_url).await
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        method: HttpMethod,
        endpoint: &str,
    ) -> Result<RawResponse, TransportError> {
        let metrics = HttpRequestMetrics::start(method, endpoint);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics.record_network_error();
                return Err(e.into());
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            metrics.record_network_error();
            TransportError::from(e)
        })?;
        metrics.record_complete(status);

        debug!(method = %method, endpoint = %endpoint, status, "Received response");
        Ok(RawResponse {
            status,
            body: parse_body(&text),
        })
    }
}

/// Parse a response body as JSON, falling back to the raw text
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }

    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Error parsing JSON body: {e}, returning raw body");
            Value::String(text.to_string())
        }
    }
}

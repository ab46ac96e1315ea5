//! Access token exchange and caching
//!
//! The manager owns the only copy of the cached [`Token`]. Refreshes are
//! single-flight: concurrent callers that find the cache empty queue on one
//! refresh lock, and whoever gets it second finds the fresh token already
//! cached instead of exchanging again.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::retry::{RetryBudget, RetryEngine, RetryError};
use super::transport::HttpTransport;
use super::waiter::Waiter;
use super::{ApiError, ApiResult, HttpMethod};
use crate::metrics::record_token_exchange;

/// Account and application credentials, immutable for the process lifetime
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
    client_id: String,
    client_secret: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Account name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Account password, including any appended one-time code
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Application id, sent as the basic-auth user
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Application secret, sent as the basic-auth password
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token and the instant after which it must not be used
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    /// Create a token from an Authorization value and expiry
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Full Authorization header value, e.g. "bearer abc"
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry instant (half the declared lifetime after issue)
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token may still be used at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Whether the token may still be used now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Build a token from a 2xx exchange body issued at `issued_at`
    ///
    /// The value is `"{token_type} {access_token}"` and the expiry is half the
    /// declared `expires_in`. A body without a usable `expires_in` yields a
    /// token that is already expired, so the next call exchanges again.
    pub fn from_exchange(body: &Value, issued_at: DateTime<Utc>) -> Self {
        TokenFields::from_body(body).into_token(issued_at)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = self.value.split(' ').next().unwrap_or_default();
        f.debug_struct("Token")
            .field("value", &format!("{scheme} <redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Fields of a token endpoint response, each read on its own
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct TokenFields<'a> {
    access_token: Option<&'a str>,
    token_type: Option<&'a str>,
    expires_in: Option<f64>,
}

impl<'a> TokenFields<'a> {
    fn from_body(body: &'a Value) -> Self {
        let text = |field: &str| {
            body.get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        };
        // Some proxies send the lifetime as a string
        let expires_in = body.get("expires_in").and_then(|v| match v {
            Value::String(s) => s.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        });

        Self {
            access_token: text("access_token"),
            token_type: text("token_type"),
            expires_in,
        }
    }

    /// Both parts of the Authorization value are present
    fn is_complete(&self) -> bool {
        self.access_token.is_some() && self.token_type.is_some()
    }

    fn into_token(self, issued_at: DateTime<Utc>) -> Token {
        let lifetime_ms = self
            .expires_in
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| (secs * 1000.0 / 2.0) as i64)
            .unwrap_or(0);

        // Absurd lifetimes saturate instead of overflowing the timestamp
        let expires_at = ChronoDuration::try_milliseconds(lifetime_ms)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Token {
            value: format!(
                "{} {}",
                self.token_type.unwrap_or_default(),
                self.access_token.unwrap_or_default()
            ),
            expires_at,
        }
    }
}

/// Owns the credential exchange and the cached token
pub struct TokenManager {
    transport: HttpTransport,
    credentials: Credentials,
    retry: RetryEngine,
    waiter: Arc<dyn Waiter>,
    retry_on_server_error: u32,
    retry_delay: Duration,
    current: RwLock<Option<Token>>,
    refresh_lock: Mutex<()>,
    exchanges: AtomicU64,
}

impl TokenManager {
    /// Create a manager with an empty cache
    ///
    /// # Arguments
    /// * `transport` - Transport holding the token endpoint URL
    /// * `credentials` - Credentials sent on every exchange
    /// * `waiter` - Suspension primitive for exchange retries
    /// * `retry_on_server_error` - Extra attempts on 5xx (0 disables retries)
    /// * `retry_delay` - Delay between attempts
    pub fn new(
        transport: HttpTransport,
        credentials: Credentials,
        waiter: Arc<dyn Waiter>,
        retry_on_server_error: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            credentials,
            retry: RetryEngine::new(waiter.clone()),
            waiter,
            retry_on_server_error,
            retry_delay,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            exchanges: AtomicU64::new(0),
        }
    }

    /// Return the cached token, exchanging credentials if it is missing or expired
    ///
    /// # Errors
    /// Returns the terminal exchange error: [`ApiError::AuthenticationFailed`]
    /// on 4xx, [`ApiError::ServerUnavailable`] once 5xx retries are spent,
    /// [`ApiError::TransportFailure`] or [`ApiError::UnexpectedResponse`].
    pub async fn get_token(&self) -> ApiResult<Token> {
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = self.cached().await {
            debug!("Using token refreshed by a concurrent caller");
            return Ok(token);
        }

        let token = self.exchange().await?;
        *self.current.write().await = Some(token.clone());
        Ok(token)
    }

    /// Drop `stale` from the cache so the next [`get_token`](Self::get_token) exchanges
    ///
    /// A no-op if the cache already holds a different token.
    pub async fn invalidate(&self, stale: &Token) {
        let mut current = self.current.write().await;
        if current.as_ref() == Some(stale) {
            debug!("Invalidating cached token");
            *current = None;
        }
    }

    /// Number of credential exchanges performed so far
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::SeqCst)
    }

    async fn cached(&self) -> Option<Token> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|token| token.is_valid())
            .cloned()
    }

    async fn exchange(&self) -> ApiResult<Token> {
        let token_url = self.transport.token_url().to_string();
        let budget = RetryBudget::from_retries(self.retry_on_server_error, self.retry_delay, false);
        let mut exchanges_left = self.retry_on_server_error;
        let mut total_attempts = 0u32;

        loop {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            let result = self
                .retry
                .retry(budget, HttpMethod::Post, &token_url, || {
                    self.transport.exchange(&self.credentials)
                })
                .await;

            let response = match result {
                Ok(response) => {
                    total_attempts += 1;
                    response
                }
                Err(RetryError::Exhausted { last, attempts }) => {
                    total_attempts += attempts;
                    last
                }
                Err(RetryError::Transport { attempts, error }) => {
                    record_token_exchange("transport_error");
                    error!(endpoint = %token_url, attempts, "Token exchange failed: {error}");
                    return Err(ApiError::TransportFailure {
                        attempts: total_attempts + attempts,
                        message: error.to_string(),
                    });
                }
            };

            match response.status / 100 {
                2 => {
                    let fields = TokenFields::from_body(&response.body);
                    if !fields.is_complete() {
                        warn!(
                            "The token retrieved was undefined. The username which we couldn't get a token for is: {}",
                            self.credentials.username()
                        );
                    }
                    let token = fields.into_token(Utc::now());
                    record_token_exchange("success");
                    info!(expires_at = %token.expires_at(), "Obtained access token");
                    return Ok(token);
                }
                4 => {
                    record_token_exchange("client_error");
                    error!(
                        endpoint = %token_url,
                        status = response.status,
                        "Getting token has resulted in {}. This can originate from not giving this user access in the app preferences",
                        response.status
                    );
                    return Err(ApiError::AuthenticationFailed {
                        status: response.status,
                        body: response.body,
                    });
                }
                5 if exchanges_left > 0 => {
                    exchanges_left -= 1;
                    warn!(
                        endpoint = %token_url,
                        status = response.status,
                        remaining = exchanges_left,
                        "Server error while getting token, repeating the exchange"
                    );
                    self.waiter.wait(self.retry_delay).await;
                }
                5 => {
                    record_token_exchange("server_error");
                    error!(
                        endpoint = %token_url,
                        status = response.status,
                        "Getting token has resulted in {}. Enable retries on server errors to retry automatically",
                        response.status
                    );
                    return Err(ApiError::ServerUnavailable {
                        status: response.status,
                        attempts: total_attempts,
                    });
                }
                _ => {
                    record_token_exchange("unexpected");
                    error!(endpoint = %token_url, status = response.status, "Unexpected token response");
                    return Err(ApiError::UnexpectedResponse {
                        status: response.status,
                    });
                }
            }
        }
    }
}

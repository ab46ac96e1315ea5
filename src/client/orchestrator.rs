//! Request orchestration
//!
//! [`ApiClient::send`] is the single entry point for resource calls. Each
//! logical call runs as a bounded loop: at most one rate-limit wait and at
//! most one reauthorization after a 403, each with a fresh retry budget.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::classifier::{classify, Outcome};
use super::retry::{RetryBudget, RetryEngine, RetryError};
use super::token::TokenManager;
use super::transport::HttpTransport;
use super::waiter::{TokioWaiter, Waiter};
use super::{ApiError, ApiResponse, ApiResult, HttpMethod, Payload, RequestSpec};
use crate::config::ClientConfig;
use crate::metrics::{record_rate_limit_wait, record_reauthorization};

/// Retry policy for resource calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientOptions {
    /// Wait once when the server sends a rate-limit hint
    pub retry_on_wait: bool,
    /// Extra attempts on 5xx and network failures
    pub retry_on_server_error: u32,
    /// Delay between attempts
    pub retry_delay: Duration,
    /// Let the retry engine repeat 403s before the token is refreshed
    pub retry_on_403_in_transport: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retry_on_wait: false,
            retry_on_server_error: 0,
            retry_delay: Duration::from_secs(5),
            retry_on_403_in_transport: false,
        }
    }
}

/// Authenticated API client
pub struct ApiClient {
    transport: HttpTransport,
    tokens: Arc<TokenManager>,
    retry: RetryEngine,
    waiter: Arc<dyn Waiter>,
    options: ClientOptions,
}

impl ApiClient {
    /// Create a client from its parts
    pub fn new(
        transport: HttpTransport,
        tokens: Arc<TokenManager>,
        waiter: Arc<dyn Waiter>,
        options: ClientOptions,
    ) -> Self {
        Self {
            transport,
            tokens,
            retry: RetryEngine::new(waiter.clone()),
            waiter,
            options,
        }
    }

    /// Build a client from configuration, sleeping with tokio between attempts
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidRequest`] if the HTTP client cannot be built
    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        Self::from_config_with_waiter(config, TokioWaiter::shared())
    }

    /// Build a client from configuration with a custom waiter
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidRequest`] if the HTTP client cannot be built
    pub fn from_config_with_waiter(
        config: &ClientConfig,
        waiter: Arc<dyn Waiter>,
    ) -> ApiResult<Self> {
        let transport = HttpTransport::new(
            config.api_base_url.clone(),
            config.token_url.clone(),
            config.user_agent.clone(),
        )?;
        let options = config.client_options();
        let tokens = Arc::new(TokenManager::new(
            transport.clone(),
            config.credentials(),
            waiter.clone(),
            options.retry_on_server_error,
            options.retry_delay,
        ));

        Ok(Self::new(transport, tokens, waiter, options))
    }

    /// Token manager shared by every call on this client
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Retry policy in effect
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Run one logical call to completion
    ///
    /// Returns the first 1xx/2xx/3xx response. Server errors and network
    /// failures are retried inside the budget, one 403 triggers a token
    /// refresh, and one rate-limit hint is honored when `retry_on_wait` is set.
    ///
    /// # Errors
    /// Every [`ApiError`] variant except `PaginationLimitExceeded` can surface
    /// here; each is terminal for this call.
    pub async fn send(&self, spec: RequestSpec) -> ApiResult<ApiResponse> {
        let mut rate_limit_waited = false;
        let mut reauthorized = false;

        loop {
            let token = self.tokens.get_token().await?;

            // After a reauthorization a second 403 must reach the classifier
            let retry_on_403 = self.options.retry_on_403_in_transport && !reauthorized;
            let budget = RetryBudget::from_retries(
                self.options.retry_on_server_error,
                self.options.retry_delay,
                retry_on_403,
            );

            let result = self
                .retry
                .retry(budget, spec.method, &spec.endpoint, || {
                    self.transport.send(&spec, token.value())
                })
                .await;

            let (response, attempts) = match result {
                Ok(response) => (response, 1),
                Err(RetryError::Exhausted { last, attempts }) => (last, attempts),
                Err(RetryError::Transport { attempts, error }) => {
                    error!(
                        method = %spec.method,
                        endpoint = %spec.endpoint,
                        attempts,
                        "Request failed at network level: {error}"
                    );
                    return Err(ApiError::TransportFailure {
                        attempts,
                        message: error.to_string(),
                    });
                }
            };

            match classify(response) {
                Outcome::Success { status, body } => {
                    debug!(method = %spec.method, endpoint = %spec.endpoint, status, "Request succeeded");
                    return Ok(ApiResponse { status, body });
                }
                Outcome::RateLimited { retry_after } => {
                    if self.options.retry_on_wait && !rate_limit_waited {
                        rate_limit_waited = true;
                        info!(
                            method = %spec.method,
                            endpoint = %spec.endpoint,
                            "Rate limited, retrying in {:.1} seconds",
                            retry_after.as_secs_f64()
                        );
                        record_rate_limit_wait(retry_after);
                        self.waiter.wait(retry_after).await;
                        continue;
                    }

                    error!(
                        method = %spec.method,
                        endpoint = %spec.endpoint,
                        repeated = rate_limit_waited,
                        "Rate limited, try again in {:.1} seconds",
                        retry_after.as_secs_f64()
                    );
                    return Err(ApiError::RateLimitExceeded { retry_after });
                }
                Outcome::ClientError { status: 403, .. } if !reauthorized => {
                    reauthorized = true;
                    warn!(
                        method = %spec.method,
                        endpoint = %spec.endpoint,
                        status = 403,
                        "Authorization expired, refreshing token and retrying once"
                    );
                    record_reauthorization();
                    self.tokens.invalidate(&token).await;
                }
                Outcome::ClientError { status: 403, .. } => {
                    error!(
                        method = %spec.method,
                        endpoint = %spec.endpoint,
                        status = 403,
                        "Received 403 again after refreshing the token"
                    );
                    return Err(ApiError::AuthorizationExpiredTwice {
                        endpoint: spec.endpoint.clone(),
                    });
                }
                Outcome::ClientError { status, body } => {
                    error!(
                        method = %spec.method,
                        endpoint = %spec.endpoint,
                        status,
                        "Request rejected: {body}"
                    );
                    return Err(ApiError::RequestRejected { status, body });
                }
                Outcome::ServerError { status, .. } => {
                    error!(
                        method = %spec.method,
                        endpoint = %spec.endpoint,
                        status,
                        attempts,
                        "Server error. Enable retry_on_server_error to retry automatically"
                    );
                    return Err(ApiError::ServerUnavailable { status, attempts });
                }
                Outcome::Unknown { status, .. } => {
                    error!(
                        method = %spec.method,
                        endpoint = %spec.endpoint,
                        status,
                        "Unexpected response status"
                    );
                    return Err(ApiError::UnexpectedResponse { status });
                }
            }
        }
    }

    /// GET with an optional query payload
    pub async fn get(&self, endpoint: &str, query: Option<Payload>) -> ApiResult<ApiResponse> {
        self.send(build(HttpMethod::Get, endpoint, query)).await
    }

    /// POST with an optional form payload
    pub async fn post(&self, endpoint: &str, form: Option<Payload>) -> ApiResult<ApiResponse> {
        self.send(build(HttpMethod::Post, endpoint, form)).await
    }

    /// PUT with an optional JSON payload
    pub async fn put(&self, endpoint: &str, body: Option<Payload>) -> ApiResult<ApiResponse> {
        self.send(build(HttpMethod::Put, endpoint, body)).await
    }

    /// PATCH with an optional JSON payload
    pub async fn patch(&self, endpoint: &str, body: Option<Payload>) -> ApiResult<ApiResponse> {
        self.send(build(HttpMethod::Patch, endpoint, body)).await
    }

    /// DELETE with an optional JSON payload
    pub async fn delete(&self, endpoint: &str, body: Option<Payload>) -> ApiResult<ApiResponse> {
        self.send(build(HttpMethod::Delete, endpoint, body)).await
    }
}

fn build(method: HttpMethod, endpoint: &str, payload: Option<Payload>) -> RequestSpec {
    let spec = RequestSpec::new(method, endpoint);
    match payload {
        Some(payload) => spec.with_payload(payload),
        None => spec,
    }
}

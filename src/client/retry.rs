//! Bounded retry around a single transport call
//!
//! Retries on:
//! - 5xx server errors
//! - network errors (timeout, connection refused)
//! - 403, only when the budget says so
//!
//! Everything else is returned to the caller after the first attempt. The
//! budget counts attempts, not extra retries: a caller with retries disabled
//! passes one attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::retry_formatter::{extract_error_type, RetryContext};
use super::transport::{RawResponse, TransportError};
use super::waiter::Waiter;
use super::HttpMethod;
use crate::metrics::record_retry_delay;

/// Attempt budget for one logical call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryBudget {
    /// Attempts left, at least one on construction
    pub attempts_remaining: u32,
    /// Delay between attempts
    pub delay: Duration,
    /// Whether a 403 counts as retryable
    pub retry_on_403: bool,
}

impl RetryBudget {
    /// Budget of `max_attempts` attempts (zero is raised to one)
    pub fn new(max_attempts: u32, delay: Duration, retry_on_403: bool) -> Self {
        Self {
            attempts_remaining: max_attempts.max(1),
            delay,
            retry_on_403,
        }
    }

    /// Budget for `retries` extra attempts after the first one
    pub fn from_retries(retries: u32, delay: Duration, retry_on_403: bool) -> Self {
        Self::new(retries.saturating_add(1), delay, retry_on_403)
    }

    /// Whether `status` should be retried under this budget
    pub fn is_retryable(&self, status: u16) -> bool {
        status / 100 == 5 || (self.retry_on_403 && status == 403)
    }
}

/// Budget spent without a non-retryable result
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetryError {
    /// Last attempt returned a retryable status
    #[error("request returned {} after exhausting {attempts} attempt(s)", .last.status)]
    Exhausted {
        /// Last observed response
        last: RawResponse,
        /// Attempts made
        attempts: u32,
    },

    /// No response was ever obtained
    #[error("transport failed on all {attempts} attempt(s): {error}")]
    Transport {
        /// Attempts made
        attempts: u32,
        /// Last transport error
        error: TransportError,
    },
}

/// Runs transport calls under a [`RetryBudget`]
#[derive(Clone)]
pub struct RetryEngine {
    waiter: Arc<dyn Waiter>,
}

impl RetryEngine {
    /// Create an engine that suspends through `waiter` between attempts
    pub fn new(waiter: Arc<dyn Waiter>) -> Self {
        Self { waiter }
    }

    /// Run `call` until it returns a non-retryable response or the budget is spent
    ///
    /// The delay is skipped after the final attempt. `method` and `endpoint`
    /// only feed the log lines.
    ///
    /// # Errors
    /// [`RetryError::Exhausted`] with the last response if any attempt produced
    /// one, [`RetryError::Transport`] if every attempt failed at network level.
    pub async fn retry<F, Fut>(
        &self,
        mut budget: RetryBudget,
        method: HttpMethod,
        endpoint: &str,
        mut call: F,
    ) -> Result<RawResponse, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawResponse, TransportError>>,
    {
        budget.attempts_remaining = budget.attempts_remaining.max(1);
        let max_attempts = budget.attempts_remaining;
        let mut attempt = 0;
        let mut last_response: Option<RawResponse> = None;
        let mut last_error: Option<TransportError> = None;

        while budget.attempts_remaining > 0 {
            budget.attempts_remaining -= 1;
            attempt += 1;
            let is_final = budget.attempts_remaining == 0;

            let ctx = match call().await {
                Ok(response) if budget.is_retryable(response.status) => {
                    let ctx = RetryContext::new(
                        attempt,
                        max_attempts,
                        extract_error_type(Some(response.status), None),
                        budget.delay,
                        method,
                        endpoint,
                    );
                    warn!(
                        method = %method,
                        endpoint = %endpoint,
                        status = response.status,
                        attempt,
                        max_attempts,
                        "Received retryable status"
                    );
                    last_response = Some(response);
                    ctx
                }
                Ok(response) => {
                    if attempt > 1 {
                        info!(
                            method = %method,
                            endpoint = %endpoint,
                            status = response.status,
                            "Request succeeded on attempt {attempt}/{max_attempts}"
                        );
                    } else {
                        debug!(method = %method, endpoint = %endpoint, status = response.status, "Request completed");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        method = %method,
                        endpoint = %endpoint,
                        attempt,
                        max_attempts,
                        "Network error: {e}"
                    );
                    let ctx = RetryContext::new(
                        attempt,
                        max_attempts,
                        extract_error_type(None, Some(&e)),
                        budget.delay,
                        method,
                        endpoint,
                    );
                    last_error = Some(e);
                    ctx
                }
            };

            if is_final {
                error!("{}", ctx.format_failure());
                break;
            }

            info!("{}", ctx.format_retry());
            record_retry_delay(budget.delay, attempt);
            self.waiter.wait(budget.delay).await;
        }

        match (last_response, last_error) {
            (Some(last), _) => Err(RetryError::Exhausted {
                last,
                attempts: attempt,
            }),
            (None, Some(error)) => Err(RetryError::Transport {
                attempts: attempt,
                error,
            }),
            (None, None) => Err(RetryError::Transport {
                attempts: attempt,
                error: TransportError::new(
                    super::transport::TransportErrorKind::Other,
                    "no attempt was made",
                ),
            }),
        }
    }
}

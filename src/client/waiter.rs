//! Timed suspension primitive
//!
//! Every delay the client takes (inter-retry delay, rate-limit wait, token
//! exchange back-off) goes through a [`Waiter`] so that the suspension points
//! are explicit and can be observed in tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Suspends the current task without blocking the runtime.
#[async_trait]
pub trait Waiter: Send + Sync {
    /// Wait for `duration`. A zero duration returns immediately.
    async fn wait(&self, duration: Duration);
}

/// Production waiter backed by `tokio::time::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioWaiter;

impl TokioWaiter {
    /// Shared handle, the form the client components take
    pub fn shared() -> Arc<dyn Waiter> {
        Arc::new(Self)
    }
}

#[async_trait]
impl Waiter for TokioWaiter {
    async fn wait(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::time::sleep(duration).await;
    }
}

//! Client metrics
//!
//! Counters and histograms for requests, retries, rate-limit waits and token
//! exchanges, exported through Prometheus when [`init_metrics`] has been
//! called. Without an installed recorder every macro is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::HttpMethod;

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are no-ops.
///
/// # Arguments
/// * `addr` - Socket address for the scrape endpoint (e.g., "0.0.0.0:9090")
///
/// # Errors
/// Returns an error if the exporter cannot be installed
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "api_requests_total",
        Unit::Count,
        "Total number of HTTP requests sent to the API, including token exchanges"
    );

    describe_histogram!(
        "api_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );

    describe_counter!(
        "api_retries_total",
        Unit::Count,
        "Total number of retry attempts after server or network errors"
    );

    describe_histogram!(
        "api_retry_delay_seconds",
        Unit::Seconds,
        "Delay before each retry in seconds"
    );

    describe_counter!(
        "api_rate_limit_waits_total",
        Unit::Count,
        "Total number of waits honoring a rate-limit hint"
    );

    describe_counter!(
        "api_token_exchanges_total",
        Unit::Count,
        "Total number of credential exchanges by result"
    );

    describe_counter!(
        "api_reauthorizations_total",
        Unit::Count,
        "Total number of token refreshes forced by a 403"
    );

    describe_counter!(
        "api_pages_fetched_total",
        Unit::Count,
        "Total number of listing pages fetched"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of one HTTP request
pub struct HttpRequestMetrics {
    method: HttpMethod,
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
}

impl HttpRequestMetrics {
    /// Start recording a new HTTP request
    pub fn start(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            method = %method,
            endpoint = %endpoint,
            "Starting HTTP request metrics"
        );

        Self {
            method,
            endpoint,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    /// Record completion of the HTTP request
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "api_requests_total",
            "method" => self.method.as_str(),
            "status" => status_code.to_string(),
        )
        .increment(1);

        histogram!(
            "api_request_duration_seconds",
            "method" => self.method.as_str(),
        )
        .record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status_code,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    /// Record a network error (no status code)
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "api_requests_total",
            "method" => self.method.as_str(),
            "status" => "network_error",
        )
        .increment(1);

        histogram!(
            "api_request_duration_seconds",
            "method" => self.method.as_str(),
        )
        .record(duration.as_secs_f64());

        warn!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            duration_ms = duration.as_millis(),
            "Network error recorded"
        );
    }

    /// Get the correlation ID for this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record the delay before a retry
pub fn record_retry_delay(delay: Duration, attempt: u32) {
    counter!("api_retries_total").increment(1);
    histogram!("api_retry_delay_seconds").record(delay.as_secs_f64());

    debug!(
        attempt = attempt,
        delay_ms = delay.as_millis(),
        "Retry delay recorded"
    );
}

/// Record a wait honoring a rate-limit hint
pub fn record_rate_limit_wait(wait: Duration) {
    counter!("api_rate_limit_waits_total").increment(1);
    debug!(wait_ms = wait.as_millis(), "Rate limit wait recorded");
}

/// Record a finished credential exchange (`success`, `client_error`, ...)
pub fn record_token_exchange(result: &'static str) {
    counter!("api_token_exchanges_total", "result" => result).increment(1);
}

/// Record a token refresh forced by a 403
pub fn record_reauthorization() {
    counter!("api_reauthorizations_total").increment(1);
}

/// Record one listing page fetched
pub fn record_page_fetched() {
    counter!("api_pages_fetched_total").increment(1);
}

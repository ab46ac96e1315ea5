//! # Reddit Dump Library
//!
//! Authenticated client for the Reddit API with transparent token caching,
//! bounded retries and cursor pagination, plus a CLI that dumps a user's
//! comment history to a JSON file.
//!
//! ## Features
//!
//! - **Token caching**: password-grant exchange, token reused until half its
//!   declared lifetime, single-flight refresh for concurrent callers
//! - **Retries**: fixed-delay retries on server and network errors
//! - **Rate limits**: optional single wait on the API's in-band rate-limit hint
//! - **Reauthorization**: one automatic token refresh after a 403
//! - **Pagination**: lazy page stream following `after` cursors
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures_util::TryStreamExt;
//! use reddit_dump::client::{ApiClient, Paginator};
//! use reddit_dump::config::ClientConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_file("config.json")?;
//! let client = ApiClient::from_config(&config)?;
//!
//! let me = client.get("/api/v1/me", None).await?;
//! println!("{}", me.body);
//!
//! let pages: Vec<_> = Paginator::new(&client)
//!     .drain_all("/user/alice/comments")
//!     .try_collect()
//!     .await?;
//! println!("{} pages", pages.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`client`] - Token manager, retry engine, classifier, orchestrator, pagination
//! - [`config`] - JSON configuration and defaults
//! - [`output`] - Page sinks (JSON array file)
//! - [`cli`] - Command-line commands
//! - [`metrics`] - Prometheus metrics
//! - [`shutdown`] - Ctrl+C coordination

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;

pub mod client;

pub mod config;

pub mod metrics;

pub mod output;

pub mod shutdown;

// Re-export commonly used types
pub use client::{ApiClient, ApiError, ApiResponse, ApiResult, HttpMethod, RequestSpec};
pub use config::ClientConfig;

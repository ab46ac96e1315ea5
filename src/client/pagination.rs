//! Cursor pagination over listing endpoints
//!
//! Listing pages are fetched strictly one after another: each request needs
//! the `after` cursor of the previous page. The stream ends when a page no
//! longer declares a cursor, or with the first terminal error.

use futures_util::{stream, Stream, TryStreamExt};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::pin::Pin;
use tracing::{debug, info};

use super::orchestrator::ApiClient;
use super::{ApiError, ApiResult, HttpMethod, RequestSpec};
use crate::config::{MAX_PAGES, PAGE_LIMIT};
use crate::metrics::record_page_fetched;

/// Stream of listing page bodies
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = ApiResult<Value>> + Send + 'a>>;

/// Position within one pagination session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationCursor {
    /// Cursor of the next page, `None` before the first page
    pub after: Option<String>,
    /// Pages consumed so far
    pub seen_count: u64,
}

impl PaginationCursor {
    /// Cursor before the first page
    pub fn new() -> Self {
        Self::default()
    }

    /// Query parameters for the next page
    pub fn query_payload(&self) -> Map<String, Value> {
        let mut query = Map::new();
        query.insert("limit".to_string(), Value::from(PAGE_LIMIT));
        query.insert("count".to_string(), Value::from(self.seen_count));
        if let Some(after) = &self.after {
            query.insert("after".to_string(), Value::String(after.clone()));
        }
        query
    }

    /// Record one consumed page and its trailing cursor
    pub fn advance(&mut self, after: Option<String>) {
        self.seen_count += 1;
        self.after = after;
    }
}

/// Listing envelope, only the fields needed to follow the cursor
#[derive(Debug, Default, Deserialize)]
pub struct Listing {
    /// Listing payload
    #[serde(default)]
    pub data: ListingData,
}

/// `data` section of a listing
#[derive(Debug, Default, Deserialize)]
pub struct ListingData {
    /// Cursor of the next page
    pub after: Option<String>,
    /// Cursor of the previous page
    pub before: Option<String>,
    /// Items on this page
    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: Vec<Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Trailing cursor of a page body, if any
///
/// Missing, null, non-string and empty cursors all end the listing.
/// Only `data.after` is read, so malformed sibling fields never hide it.
pub fn next_cursor(page: &Value) -> Option<String> {
    page.pointer("/data/after")
        .and_then(Value::as_str)
        .filter(|after| !after.is_empty())
        .map(String::from)
}

struct DrainState {
    cursor: PaginationCursor,
    done: bool,
}

/// Drives pagination sessions through an [`ApiClient`]
pub struct Paginator<'a> {
    client: &'a ApiClient,
    max_pages: u64,
}

impl<'a> Paginator<'a> {
    /// Paginator with the default page cap
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            max_pages: MAX_PAGES,
        }
    }

    /// Override the page cap
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Lazily fetch every page of `path`
    ///
    /// Nothing is requested until the stream is polled. Calling this again
    /// starts a new session from the first page. After an error the stream
    /// yields nothing more.
    pub fn drain_all(&self, path: &str) -> PageStream<'a> {
        let client = self.client;
        let max_pages = self.max_pages;
        let path = path.to_string();

        let pages = stream::unfold(
            DrainState {
                cursor: PaginationCursor::new(),
                done: false,
            },
            move |mut state| {
                let path = path.clone();

                async move {
                    if state.done {
                        return None;
                    }

                    if state.cursor.seen_count >= max_pages {
                        state.done = true;
                        return Some((
                            Err(ApiError::PaginationLimitExceeded {
                                pages: state.cursor.seen_count,
                            }),
                            state,
                        ));
                    }

                    let spec = RequestSpec::new(HttpMethod::Get, path.as_str())
                        .with_payload(state.cursor.query_payload());

                    match client.send(spec).await {
                        Ok(response) => {
                            let after = next_cursor(&response.body);
                            state.cursor.advance(after.clone());
                            record_page_fetched();
                            debug!(
                                endpoint = %path,
                                page = state.cursor.seen_count,
                                after = after.as_deref().unwrap_or(""),
                                "Fetched page"
                            );

                            if after.is_none() {
                                info!(endpoint = %path, pages = state.cursor.seen_count, "Pagination complete");
                                state.done = true;
                            }
                            Some((Ok(response.body), state))
                        }
                        Err(e) => {
                            state.done = true;
                            Some((Err(e), state))
                        }
                    }
                }
            },
        );

        Box::pin(pages)
    }

    /// Fetch every page of `path` into memory
    ///
    /// # Errors
    /// The first terminal error ends the session; pages fetched so far are dropped.
    pub async fn collect_all(&self, path: &str) -> ApiResult<Vec<Value>> {
        self.drain_all(path).try_collect().await
    }
}

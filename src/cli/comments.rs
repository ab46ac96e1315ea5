//! `comments` command: dump a user's comment listing to a JSON file

use clap::Args;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::CliError;
use crate::client::{ApiClient, Paginator};
use crate::output::{JsonArrayWriter, OutputWriter, PageSink};
use crate::shutdown::SharedShutdown;

/// Comments command arguments
#[derive(Args, Debug)]
pub struct CommentsCommand {
    /// User whose comments to dump (defaults to the configured account)
    #[arg(long)]
    pub user: Option<String>,

    /// Output file
    #[arg(long, short, default_value = "comments.json")]
    pub output: PathBuf,
}

impl CommentsCommand {
    /// Listing path for `user`
    pub fn listing_path(user: &str) -> String {
        format!("/user/{user}/comments")
    }

    /// Drain the listing into the output file, returning the page count
    ///
    /// # Errors
    /// A terminal API error aborts the dump. Pages written before it stay in
    /// the file and the array is left open.
    pub async fn execute(
        &self,
        client: &ApiClient,
        default_user: &str,
        shutdown: SharedShutdown,
    ) -> Result<u64, CliError> {
        let user = self.user.as_deref().unwrap_or(default_user);
        if user.trim().is_empty() {
            return Err(CliError::InvalidArgument("user must not be empty".into()));
        }

        info!(user = %user, output = %self.output.display(), "Dumping comments");
        dump_listing(client, &Self::listing_path(user), &self.output, shutdown).await
    }
}

/// Stream every page of `path` into a JSON array at `output`
///
/// # Errors
/// Returns the first API or output error, or [`CliError::Interrupted`] when
/// shutdown is requested between pages.
pub async fn dump_listing(
    client: &ApiClient,
    path: &str,
    output: &Path,
    shutdown: SharedShutdown,
) -> Result<u64, CliError> {
    let mut writer = JsonArrayWriter::new(output)?;
    let paginator = Paginator::new(client);
    let mut pages = paginator.drain_all(path);

    loop {
        let next = tokio::select! {
            page = pages.next() => page,
            _ = shutdown.wait_for_shutdown() => {
                warn!(pages = writer.pages_written(), "Interrupted, leaving partial output");
                writer.flush()?;
                return Err(CliError::Interrupted { pages: writer.pages_written() });
            }
        };

        match next {
            Some(Ok(page)) => writer.write_page(&page)?,
            Some(Err(e)) => {
                error!(
                    endpoint = %path,
                    pages = writer.pages_written(),
                    "Dump aborted: {e}"
                );
                writer.flush()?;
                return Err(e.into());
            }
            None => break,
        }
    }

    let written = writer.pages_written();
    writer.close()?;
    info!(pages = written, output = %output.display(), "Dump complete");
    Ok(written)
}

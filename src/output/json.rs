//! JSON array file writer
//!
//! Pages are appended as they arrive so a long dump is visible on disk while
//! it runs. The closing bracket is only written by [`OutputWriter::close`];
//! an aborted dump leaves the array open.

use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OutputError, OutputResult, OutputWriter, PageSink};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Writes pages as the elements of one pretty-printed JSON array
pub struct JsonArrayWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    pages_written: u64,
}

impl JsonArrayWriter {
    /// Create the file (and parent directories) and open the array
    ///
    /// # Arguments
    /// * `path` - Output file path, truncated if it exists
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating JSON writer: path={}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {}", e)))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {}", e)))?;

        let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
        writer
            .write_all(b"[\n")
            .map_err(|e| OutputError::IoError(format!("Failed to write: {}", e)))?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            pages_written: 0,
        })
    }

    /// Number of pages written so far
    pub fn pages_written(&self) -> u64 {
        self.pages_written
    }

    /// Output file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSink for JsonArrayWriter {
    fn write_page(&mut self, page: &Value) -> OutputResult<()> {
        if self.pages_written > 0 {
            self.writer
                .write_all(b",\n")
                .map_err(|e| OutputError::IoError(format!("Failed to write: {}", e)))?;
        }

        serde_json::to_writer_pretty(&mut self.writer, page)
            .map_err(|e| OutputError::SerializationError(format!("Failed to write page: {}", e)))?;

        self.pages_written += 1;
        // Each page is flushed so a crash loses at most the page in flight
        self.flush()?;
        debug!(pages = self.pages_written, "Page written");
        Ok(())
    }
}

impl OutputWriter for JsonArrayWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(e.to_string()))
    }

    fn close(mut self) -> OutputResult<()> {
        self.writer
            .write_all(b"\n]\n")
            .map_err(|e| OutputError::IoError(format!("Failed to write: {}", e)))?;
        self.flush()?;
        info!(
            "JSON writer closed: path={}, pages={}",
            self.path.display(),
            self.pages_written
        );
        Ok(())
    }
}

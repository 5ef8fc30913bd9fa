//! Batch accumulator
//!
//! Groups non-blank lines into fixed-size pages and writes each page to the
//! record store in one call. Pages are flushed synchronously, so a slow store
//! slows down reading instead of growing memory.

use futures::{pin_mut, Stream, StreamExt};
use std::sync::Arc;
use tracing::debug;

use super::error::IngestResult;
use super::record_store::RecordRepository;
use super::types::Record;

/// Records per bulk write
pub const PAGE_SIZE: usize = 1000;

pub struct BatchAccumulator {
    records: Arc<dyn RecordRepository>,
    object_key: String,
    page: Vec<Record>,
    page_size: usize,
    lines_processed: u64,
    pages_flushed: usize,
}

impl BatchAccumulator {
    pub fn new(records: Arc<dyn RecordRepository>, object_key: impl Into<String>) -> Self {
        Self {
            records,
            object_key: object_key.into(),
            page: Vec::with_capacity(PAGE_SIZE),
            page_size: PAGE_SIZE,
            lines_processed: 0,
            pages_flushed: 0,
        }
    }

    /// Add one line, flushing when the page fills up.
    ///
    /// Whitespace-only lines are skipped and not counted. Kept lines are
    /// stored as delivered, without trimming.
    pub async fn push(&mut self, line: String) -> IngestResult<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        self.page.push(Record {
            content: line,
            original_file: self.object_key.clone(),
        });
        self.lines_processed += 1;

        if self.page.len() >= self.page_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Write the current page, if any
    pub async fn flush(&mut self) -> IngestResult<()> {
        if self.page.is_empty() {
            return Ok(());
        }

        let page = std::mem::replace(&mut self.page, Vec::with_capacity(self.page_size));
        let size = page.len();
        self.records.bulk_insert(page).await?;
        self.pages_flushed += 1;

        debug!(
            object_key = %self.object_key,
            page = self.pages_flushed,
            size,
            "Flushed record page"
        );
        Ok(())
    }

    /// Flush the trailing partial page and return the non-blank line count
    pub async fn finish(mut self) -> IngestResult<u64> {
        self.flush().await?;
        Ok(self.lines_processed)
    }

    /// Consume `lines` to the end.
    ///
    /// The first reader or flush error stops consumption; pages already
    /// written stay written and the unflushed page is dropped.
    pub async fn drain<S>(mut self, lines: S) -> IngestResult<u64>
    where
        S: Stream<Item = IngestResult<String>>,
    {
        pin_mut!(lines);
        while let Some(line) = lines.next().await {
            self.push(line?).await?;
        }
        self.finish().await
    }
}

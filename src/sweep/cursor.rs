//! Lazy, restartable batch scan over primary records.
//!
//! The cursor reads at most `page_size` records per round trip so a scan over
//! hundreds of thousands of records never holds more than one batch. Filters
//! naming explicit ids are read in a single unbounded batch instead, because
//! LIMIT/OFFSET over an id list does not reliably return every listed record.

use std::{collections::HashMap, sync::Arc};

use tokio_util::sync::CancellationToken;

use super::error::{SweepError, SweepResult};
use crate::{
    db::{Page, RecordRepo},
    models::{Record, RecordId, ScanFilter},
};

/// Zero-argument callback releasing transient working-set memory between
/// batches. Its outcome is never consulted.
pub type ShrinkFn = Arc<dyn Fn() + Send + Sync>;

/// How the cursor advances between batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pagination {
    /// `LIMIT/OFFSET` ordered by id.
    #[default]
    Offset,
    /// Seek past the last id seen. Stable when the caller deletes records
    /// between batches.
    Keyset,
}

pub struct BatchCursor {
    repo: Arc<dyn RecordRepo>,
    filter: ScanFilter,
    page_size: u64,
    pagination: Pagination,
    attribute_keys: Vec<String>,
    shrink: Option<ShrinkFn>,
    cancel: CancellationToken,

    offset: u64,
    last_seen: Option<RecordId>,
    exhausted: bool,
    shrink_pending: bool,
    batches: u64,
    processed: u64,
}

impl BatchCursor {
    pub fn new(repo: Arc<dyn RecordRepo>, filter: ScanFilter, page_size: u64) -> Self {
        Self {
            repo,
            filter,
            page_size: page_size.max(1),
            pagination: Pagination::default(),
            attribute_keys: Vec::new(),
            shrink: None,
            cancel: CancellationToken::new(),
            offset: 0,
            last_seen: None,
            exhausted: false,
            shrink_pending: false,
            batches: 0,
            processed: 0,
        }
    }

    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Fill [`Record::attributes`] for these keys on every batch.
    pub fn with_attributes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn on_shrink(mut self, shrink: Option<ShrinkFn>) -> Self {
        self.shrink = shrink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Start over from the first record.
    pub fn rewind(&mut self) {
        self.offset = 0;
        self.last_seen = None;
        self.exhausted = false;
        self.batches = 0;
        self.processed = 0;
    }

    /// Batches returned since the last rewind.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Records returned since the last rewind.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Fetch the next batch, or `None` once the scan is complete.
    ///
    /// The shrink callback for a batch fires on the following call, once the
    /// caller is done with it. A cancelled token ends the scan with
    /// [`SweepError::Cancelled`].
    pub async fn next_batch(&mut self) -> SweepResult<Option<Vec<Record>>> {
        if self.shrink_pending {
            self.shrink_pending = false;
            if let Some(shrink) = &self.shrink {
                shrink();
            }
        }

        if self.exhausted {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            tracing::warn!(
                processed = self.processed,
                "Scan cancelled after {} records",
                self.processed
            );
            return Err(SweepError::Cancelled);
        }

        let unbounded = self.filter.targets_explicit_ids();
        let page = if unbounded {
            if self.batches == 0 {
                tracing::warn!(
                    include = self.filter.include.len(),
                    exclude = self.filter.exclude.len(),
                    "Filter names explicit ids; reading them in one unpaginated batch"
                );
            }
            Page::Unbounded
        } else {
            match self.pagination {
                Pagination::Offset => Page::Offset {
                    offset: self.offset,
                    limit: self.page_size,
                },
                Pagination::Keyset => Page::After {
                    after: self.last_seen,
                    limit: self.page_size,
                },
            }
        };

        let mut records = self.repo.fetch_page(&self.filter, page).await?;
        let fetched = records.len() as u64;

        if unbounded || fetched < self.page_size {
            self.exhausted = true;
        }
        if records.is_empty() {
            self.finish();
            return Ok(None);
        }

        self.offset += fetched;
        self.last_seen = records.last().map(|record| record.id);
        self.batches += 1;
        self.processed += fetched;
        self.shrink_pending = true;

        self.preload_attributes(&mut records).await?;

        tracing::debug!(
            batch = self.batches,
            size = fetched,
            processed = self.processed,
            "Fetched batch"
        );

        if self.exhausted {
            self.finish();
        }

        Ok(Some(records))
    }

    async fn preload_attributes(&self, records: &mut [Record]) -> SweepResult<()> {
        if self.attribute_keys.is_empty() {
            return Ok(());
        }

        let ids: Vec<RecordId> = records.iter().map(|record| record.id).collect();
        let positions: HashMap<RecordId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        for key in &self.attribute_keys {
            for (id, value) in self.repo.attributes(&ids, key).await? {
                if let Some(&i) = positions.get(&id) {
                    records[i].attributes.insert(key.clone(), value);
                }
            }
        }
        Ok(())
    }

    fn finish(&self) {
        tracing::debug!(
            batches = self.batches,
            processed = self.processed,
            "Scan complete"
        );
    }
}

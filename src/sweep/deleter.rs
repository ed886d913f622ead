//! Cascading deletes across the primary and dependent tables.

use std::{fmt, sync::Arc};

use super::error::{SweepError, SweepResult};
use crate::{
    db::{
        RecordRepo,
        query::{Comparator, Condition, Delete, Table},
    },
    models::RecordId,
};

/// Outcome of one table's delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsAffected {
    Deleted(u64),
    /// Dry run: the statement was not executed, so the count is unknown.
    Unknown,
}

impl RowsAffected {
    /// Combine the outcomes of two chunks for the same table.
    pub fn merge(self, other: RowsAffected) -> RowsAffected {
        match (self, other) {
            (RowsAffected::Deleted(a), RowsAffected::Deleted(b)) => RowsAffected::Deleted(a + b),
            _ => RowsAffected::Unknown,
        }
    }
}

impl fmt::Display for RowsAffected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowsAffected::Deleted(rows) => write!(f, "{rows}"),
            RowsAffected::Unknown => f.write_str("?"),
        }
    }
}

/// Per-table result of one cascading delete call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Ids the call was made for.
    pub ids: Vec<RecordId>,
    /// Physical table name and outcome, in cascade order. Empty for a no-op.
    pub tables: Vec<(String, RowsAffected)>,
    /// Rendered statements that would have run. Only filled on dry runs.
    pub statements: Vec<String>,
}

impl DeleteReport {
    pub fn rows(&self, table: &str) -> Option<RowsAffected> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, rows)| *rows)
    }
}

/// Removes records plus their translation links and attribute rows.
pub struct CascadingDeleter {
    repo: Arc<dyn RecordRepo>,
    max_chunk: usize,
}

impl CascadingDeleter {
    /// `max_chunk` is the most ids accepted by one [`delete`](Self::delete)
    /// call; callers slice larger sets themselves.
    pub fn new(repo: Arc<dyn RecordRepo>, max_chunk: usize) -> Self {
        Self {
            repo,
            max_chunk: max_chunk.max(1),
        }
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// The three deletes for `ids`, in cascade order.
    pub fn plan(&self, ids: &[RecordId], comparator: Comparator) -> Vec<Delete> {
        Table::CASCADE
            .iter()
            .map(|&table| Delete::new(table, Condition::ids(table.record_key(), comparator, ids)))
            .collect()
    }

    /// Delete `ids` from the primary table, then translation links, then
    /// attribute rows, in one transaction.
    ///
    /// An empty list returns immediately without touching the store. On a
    /// dry run nothing executes and every table reports
    /// [`RowsAffected::Unknown`]. A failed delete leaves all three tables
    /// untouched for this chunk.
    pub async fn delete(
        &self,
        ids: &[RecordId],
        comparator: Comparator,
        dry_run: bool,
    ) -> SweepResult<DeleteReport> {
        if ids.is_empty() {
            return Ok(DeleteReport::default());
        }
        if ids.len() > self.max_chunk {
            return Err(SweepError::ChunkTooLarge {
                len: ids.len(),
                max: self.max_chunk,
            });
        }

        let names = self.repo.table_names();
        let mut report = DeleteReport {
            ids: ids.to_vec(),
            ..Default::default()
        };

        let plan = self.plan(ids, comparator);

        if dry_run {
            for delete in &plan {
                let table = names.name(delete.table());
                let preview = delete.build(names).preview();
                tracing::info!(table = %table, "DRY RUN: Would run {}", preview);
                report.statements.push(preview);
                report.tables.push((table, RowsAffected::Unknown));
            }
            return Ok(report);
        }

        let affected = self.repo.execute_deletes(&plan).await?;
        for (delete, rows) in plan.iter().zip(affected) {
            let table = names.name(delete.table());
            tracing::debug!(table = %table, rows, ids = ids.len(), "Deleted rows");
            report.tables.push((table, RowsAffected::Deleted(rows)));
        }

        Ok(report)
    }
}

//! The three sweep operations and their summary report.

use std::{collections::HashSet, fmt, sync::Arc};

use futures::{StreamExt, TryStreamExt, stream};
use tokio_util::sync::CancellationToken;

use super::{
    cursor::{BatchCursor, Pagination, ShrinkFn},
    deleter::{CascadingDeleter, DeleteReport, RowsAffected},
    error::{SweepError, SweepResult},
    keep_set::{IdHook, KeepSet, KeepSetBuilder, KeyHook, ProtectedIds},
    resolver::{GuidResolver, NamePrefixResolver},
};
use crate::{
    config::{KeepSettings, SweepSettings},
    db::{RecordRepo, query::Comparator},
    models::{RecordId, ScanFilter, join_ids},
};

/// Which sweep ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    NameTwins,
    KeepSet,
    GuidTwins,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::NameTwins => "name-twins",
            Operation::KeepSet => "keep-set",
            Operation::GuidTwins => "guid-twins",
        })
    }
}

/// Summary of one sweep run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub operation: Operation,
    pub dry_run: bool,
    /// Records visited across every scan of the run.
    pub scanned: u64,
    /// Size of the finalized keep-set, for operations that build one.
    pub keep_set: Option<usize>,
    /// Ids handed to the deleter, ascending.
    pub candidates: Vec<RecordId>,
    /// Rows affected per physical table, in cascade order.
    pub tables: Vec<(String, RowsAffected)>,
    /// Statements that would have run (dry runs only).
    pub statements: Vec<String>,
}

impl SweepReport {
    fn new(operation: Operation, dry_run: bool) -> Self {
        Self {
            operation,
            dry_run,
            scanned: 0,
            keep_set: None,
            candidates: Vec::new(),
            tables: Vec::new(),
            statements: Vec::new(),
        }
    }

    fn absorb(&mut self, report: DeleteReport) {
        self.candidates.extend(report.ids);
        for (table, rows) in report.tables {
            match self.tables.iter_mut().find(|(name, _)| *name == table) {
                Some((_, total)) => *total = total.merge(rows),
                None => self.tables.push((table, rows)),
            }
        }
        self.statements.extend(report.statements);
    }

    fn finish(mut self) -> Self {
        self.candidates.sort_unstable();
        self
    }

    /// Rows removed from `table`, if it was touched.
    pub fn rows(&self, table: &str) -> Option<RowsAffected> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, rows)| *rows)
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.dry_run { " (dry run)" } else { "" };
        writeln!(f, "{}{}: scanned {} records", self.operation, mode, self.scanned)?;
        if let Some(keep) = self.keep_set {
            writeln!(f, "Keep-set: {keep} ids")?;
        }
        if self.candidates.is_empty() {
            return writeln!(f, "Nothing to purge");
        }
        let verb = if self.dry_run { "Would purge" } else { "Purged" };
        writeln!(f, "{verb}: {}", join_ids(&self.candidates))?;
        for (table, rows) in &self.tables {
            writeln!(f, "Deleted: {rows} from {table}")?;
        }
        for statement in &self.statements {
            writeln!(f, "Dry-run: {statement}")?;
        }
        Ok(())
    }
}

/// Runs sweep operations against one record store.
pub struct Sweeper {
    repo: Arc<dyn RecordRepo>,
    settings: SweepSettings,
    id_hooks: Vec<Arc<dyn IdHook>>,
    key_hooks: Vec<Arc<dyn KeyHook>>,
    shrink: Option<ShrinkFn>,
    cancel: CancellationToken,
}

impl Sweeper {
    pub fn new(repo: Arc<dyn RecordRepo>, settings: SweepSettings) -> Self {
        Self {
            repo,
            settings,
            id_hooks: Vec::new(),
            key_hooks: Vec::new(),
            shrink: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_id_hook(mut self, hook: Arc<dyn IdHook>) -> Self {
        self.id_hooks.push(hook);
        self
    }

    pub fn with_key_hook(mut self, hook: Arc<dyn KeyHook>) -> Self {
        self.key_hooks.push(hook);
        self
    }

    /// Callback invoked once per processed batch.
    pub fn on_shrink(mut self, shrink: ShrinkFn) -> Self {
        self.shrink = Some(shrink);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    fn cursor(&self, filter: ScanFilter) -> BatchCursor {
        BatchCursor::new(Arc::clone(&self.repo), filter, self.settings.posts_per_page)
            .pagination(Pagination::Keyset)
            .on_shrink(self.shrink.clone())
            .with_cancellation(self.cancel.clone())
    }

    fn deleter(&self) -> CascadingDeleter {
        CascadingDeleter::new(Arc::clone(&self.repo), self.settings.chunk_size())
    }

    /// Delete `ids` in chunks of at most `posts_per_page`, one chunk at a time.
    async fn delete_chunked(
        &self,
        deleter: &CascadingDeleter,
        ids: &[RecordId],
        report: &mut SweepReport,
    ) -> SweepResult<()> {
        for chunk in ids.chunks(deleter.max_chunk()) {
            let result = deleter
                .delete(chunk, Comparator::Equals, self.settings.dry_run)
                .await?;
            report.absorb(result);
        }
        Ok(())
    }

    /// Delete the numbered-suffix twins of every record matching `filter`.
    ///
    /// Records are read in keyset order so deletions never shift later
    /// batches. A record already purged as a twin is not processed again.
    pub async fn name_twins(&self, filter: ScanFilter) -> SweepResult<SweepReport> {
        let dry_run = self.settings.dry_run;
        let resolver = NamePrefixResolver::new(Arc::clone(&self.repo));
        let deleter = self.deleter();
        let mut report = SweepReport::new(Operation::NameTwins, dry_run);
        let mut purged = HashSet::new();

        tracing::info!(dry_run, "Starting name twin sweep");

        let mut cursor = self.cursor(filter);
        while let Some(batch) = cursor.next_batch().await? {
            for record in batch {
                if purged.contains(&record.id) {
                    continue;
                }
                tracing::info!(
                    record_id = %record.id,
                    "Finding twins of '{}' ({})",
                    record.title,
                    record.id
                );

                let twins: Vec<RecordId> = resolver
                    .twins_of(&record)
                    .await?
                    .into_iter()
                    .filter(|id| !purged.contains(id))
                    .collect();
                if twins.is_empty() {
                    continue;
                }

                self.delete_chunked(&deleter, &twins, &mut report).await?;
                tracing::info!(
                    record_id = %record.id,
                    "Purged attachments: {}",
                    join_ids(&twins)
                );
                purged.extend(twins);
            }
        }

        report.scanned = cursor.processed();
        Ok(report.finish())
    }

    /// Build the keep-set, then delete every record matching `filter` that
    /// is not in it.
    ///
    /// The keep-set is finalized before the complement is computed. An
    /// interrupted scan aborts the whole run before any deletion.
    pub async fn keep_set(
        &self,
        keep: &KeepSettings,
        filter: ScanFilter,
    ) -> SweepResult<SweepReport> {
        let scan_filter = keep.scan_filter().ok_or_else(|| {
            SweepError::Configuration(
                "keep.scan_post_type is required to build a keep-set".into(),
            )
        })?;

        let dry_run = self.settings.dry_run;
        let mut report = SweepReport::new(Operation::KeepSet, dry_run);

        tracing::info!(
            dry_run,
            seeds = keep.ids.len(),
            keys = ?keep.keys,
            "Starting keep-set sweep"
        );

        let mut builder = KeepSetBuilder::new(Arc::clone(&self.repo), self.settings.posts_per_page)
            .on_shrink(self.shrink.clone())
            .with_cancellation(self.cancel.clone());
        for hook in &self.id_hooks {
            builder = builder.with_id_hook(Arc::clone(hook));
        }
        if !keep.protected_ids.is_empty() {
            builder = builder.with_id_hook(Arc::new(ProtectedIds(keep.protected_ids.clone())));
        }
        for hook in &self.key_hooks {
            builder = builder.with_key_hook(Arc::clone(hook));
        }

        let (keep_set, scanned) = builder
            .build(keep.ids.clone(), keep.keys.clone(), &scan_filter)
            .await?;
        report.scanned += scanned;
        report.keep_set = Some(keep_set.len());

        let (candidates, scanned) = self.complement(&keep_set, filter).await?;
        report.scanned += scanned;

        tracing::info!(
            keep_set = keep_set.len(),
            candidates = candidates.len(),
            "Computed records outside the keep-set"
        );

        let deleter = self.deleter();
        let results: Vec<DeleteReport> = stream::iter(candidates.chunks(deleter.max_chunk()))
            .map(|chunk| {
                let deleter = &deleter;
                let cancel = &self.cancel;
                async move {
                    if cancel.is_cancelled() {
                        return Err(SweepError::Cancelled);
                    }
                    deleter.delete(chunk, Comparator::Equals, dry_run).await
                }
            })
            .buffer_unordered(self.settings.delete_concurrency.max(1))
            .try_collect()
            .await?;

        for result in results {
            report.absorb(result);
        }
        Ok(report.finish())
    }

    /// Ids matching `filter` that are not in `keep`, ascending.
    async fn complement(
        &self,
        keep: &KeepSet,
        filter: ScanFilter,
    ) -> SweepResult<(Vec<RecordId>, u64)> {
        let mut candidates = Vec::new();
        let mut cursor = self.cursor(filter);
        while let Some(batch) = cursor.next_batch().await? {
            candidates.extend(
                batch
                    .iter()
                    .map(|record| record.id)
                    .filter(|id| !keep.contains(*id)),
            );
        }
        Ok((candidates, cursor.processed()))
    }

    /// Delete guid duplicates of the records referenced under `key`.
    ///
    /// Every id named by any scanned record's `key` attribute is canonical
    /// and survives. Holders are selected by `filter` plus the presence of
    /// the attribute.
    pub async fn guid_twins(&self, key: &str, filter: ScanFilter) -> SweepResult<SweepReport> {
        if key.trim().is_empty() {
            return Err(SweepError::Configuration(
                "guid-twins requires a non-empty attribute key".into(),
            ));
        }

        let dry_run = self.settings.dry_run;
        let mut report = SweepReport::new(Operation::GuidTwins, dry_run);

        tracing::info!(dry_run, key, "Starting guid twin sweep");

        let builder = KeepSetBuilder::new(Arc::clone(&self.repo), self.settings.posts_per_page)
            .on_shrink(self.shrink.clone())
            .with_cancellation(self.cancel.clone());

        let holders = filter.has_attribute(key);
        let (canonical, scanned) = builder
            .build(Vec::new(), vec![key.to_string()], &holders)
            .await?;
        report.scanned = scanned;
        report.keep_set = Some(canonical.len());

        let resolver = GuidResolver::new(Arc::clone(&self.repo));
        let deleter = self.deleter();
        let referenced = canonical.sorted();
        let mut purged = HashSet::new();

        for chunk in referenced.chunks(deleter.max_chunk()) {
            if self.cancel.is_cancelled() {
                return Err(SweepError::Cancelled);
            }
            let twins: Vec<RecordId> = resolver
                .twins_of(chunk, &canonical)
                .await?
                .into_iter()
                .filter(|id| purged.insert(*id))
                .collect();
            if twins.is_empty() {
                continue;
            }
            self.delete_chunked(&deleter, &twins, &mut report).await?;
        }

        if report.candidates.is_empty() {
            tracing::warn!(key, "Found no guid twins");
        }
        Ok(report.finish())
    }
}

//! Keep-set accumulation.
//!
//! A [`KeepSet`] is owned by the caller and filled in one pass: seed ids, then
//! the registered hooks, then every id referenced by the scanned records'
//! attributes. It is read-only once [`KeepSetBuilder::build`] returns.

use std::{collections::HashSet, sync::Arc};

use tokio_util::sync::CancellationToken;

use super::{
    cursor::{BatchCursor, Pagination, ShrinkFn},
    error::{SweepError, SweepResult},
};
use crate::{
    db::RecordRepo,
    models::{RecordId, ScanFilter},
};

/// Error type returned by keep-set hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Deduplicated set of ids that must survive a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepSet {
    ids: HashSet<RecordId>,
}

impl KeepSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an id. Placeholder ids are ignored.
    pub fn insert(&mut self, id: RecordId) -> bool {
        !id.is_placeholder() && self.ids.insert(id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Members in ascending order.
    pub fn sorted(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Extend<RecordId> for KeepSet {
    fn extend<I: IntoIterator<Item = RecordId>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl FromIterator<RecordId> for KeepSet {
    fn from_iter<I: IntoIterator<Item = RecordId>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Extension point receiving the seed id list before the scan.
pub trait IdHook: Send + Sync {
    fn name(&self) -> &str;

    fn filter_ids(&self, ids: Vec<RecordId>) -> Result<Vec<RecordId>, HookError>;
}

/// Extension point receiving the seed attribute keys before the scan.
pub trait KeyHook: Send + Sync {
    fn name(&self) -> &str;

    fn filter_keys(&self, keys: Vec<String>) -> Result<Vec<String>, HookError>;
}

/// Closure-backed hook.
pub struct HookFn<F> {
    name: String,
    f: F,
}

impl<F> HookFn<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> IdHook for HookFn<F>
where
    F: Fn(Vec<RecordId>) -> Result<Vec<RecordId>, HookError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn filter_ids(&self, ids: Vec<RecordId>) -> Result<Vec<RecordId>, HookError> {
        (self.f)(ids)
    }
}

impl<F> KeyHook for HookFn<F>
where
    F: Fn(Vec<String>) -> Result<Vec<String>, HookError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn filter_keys(&self, keys: Vec<String>) -> Result<Vec<String>, HookError> {
        (self.f)(keys)
    }
}

/// Built-in hook appending the configured `keep.protected_ids`.
pub struct ProtectedIds(pub Vec<RecordId>);

impl IdHook for ProtectedIds {
    fn name(&self) -> &str {
        "protected_ids"
    }

    fn filter_ids(&self, mut ids: Vec<RecordId>) -> Result<Vec<RecordId>, HookError> {
        ids.extend(self.0.iter().copied());
        Ok(ids)
    }
}

pub struct KeepSetBuilder {
    repo: Arc<dyn RecordRepo>,
    page_size: u64,
    id_hooks: Vec<Arc<dyn IdHook>>,
    key_hooks: Vec<Arc<dyn KeyHook>>,
    shrink: Option<ShrinkFn>,
    cancel: CancellationToken,
}

impl KeepSetBuilder {
    pub fn new(repo: Arc<dyn RecordRepo>, page_size: u64) -> Self {
        Self {
            repo,
            page_size,
            id_hooks: Vec::new(),
            key_hooks: Vec::new(),
            shrink: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Register an id hook. Hooks run in registration order.
    pub fn with_id_hook(mut self, hook: Arc<dyn IdHook>) -> Self {
        self.id_hooks.push(hook);
        self
    }

    /// Register a key hook. Hooks run in registration order.
    pub fn with_key_hook(mut self, hook: Arc<dyn KeyHook>) -> Self {
        self.key_hooks.push(hook);
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

    /// Run the hooks once, then scan `scan_filter` for ids referenced under
    /// each key. Returns the finalized keep-set and the number of records
    /// scanned.
    pub async fn build(
        &self,
        seed_ids: Vec<RecordId>,
        seed_keys: Vec<String>,
        scan_filter: &ScanFilter,
    ) -> SweepResult<(KeepSet, u64)> {
        let ids = self.run_id_hooks(seed_ids)?;
        let keys = self.run_key_hooks(seed_keys)?;

        let mut keep: KeepSet = ids.into_iter().collect();
        let mut seen = HashSet::new();
        let keys: Vec<String> = keys
            .into_iter()
            .filter(|key| !key.trim().is_empty() && seen.insert(key.clone()))
            .collect();

        if keys.is_empty() {
            tracing::warn!(
                keep_set = keep.len(),
                "No keep keys configured; only seed ids are protected and everything else is a candidate"
            );
            return Ok((keep, 0));
        }

        let mut cursor = BatchCursor::new(Arc::clone(&self.repo), scan_filter.clone(), self.page_size)
            .pagination(Pagination::Keyset)
            .with_attributes(keys.iter().cloned())
            .on_shrink(self.shrink.clone())
            .with_cancellation(self.cancel.clone());

        while let Some(batch) = cursor.next_batch().await? {
            for record in &batch {
                for key in &keys {
                    let Some(value) = record.attribute(key) else {
                        continue;
                    };
                    match value.record_ids() {
                        Ok(ids) => keep.extend(ids),
                        Err(e) => tracing::warn!(
                            record_id = %record.id,
                            key = %key,
                            error = %e,
                            "Skipping undecodable attribute value"
                        ),
                    }
                }
            }
        }

        tracing::info!(
            keys = ?keys,
            scanned = cursor.processed(),
            keep_set = keep.len(),
            "Keep-set finalized"
        );
        if keep.is_empty() {
            tracing::warn!("Keep-set is empty");
        }

        Ok((keep, cursor.processed()))
    }

    fn run_id_hooks(&self, mut ids: Vec<RecordId>) -> SweepResult<Vec<RecordId>> {
        for hook in &self.id_hooks {
            ids = hook.filter_ids(ids).map_err(|e| SweepError::Hook {
                hook: hook.name().to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(ids)
    }

    fn run_key_hooks(&self, mut keys: Vec<String>) -> SweepResult<Vec<String>> {
        for hook in &self.key_hooks {
            keys = hook.filter_keys(keys).map_err(|e| SweepError::Hook {
                hook: hook.name().to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(keys)
    }
}

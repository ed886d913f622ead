//! Duplicate resolution strategies.
//!
//! Both strategies only read; deciding what to delete with the result is up
//! to the caller.

use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use super::{error::SweepResult, keep_set::KeepSet};
use crate::{
    db::{
        RecordRepo,
        query::{Column, Comparator, Condition},
    },
    models::{Record, RecordId},
};

/// Finds records named after an original with a `-<suffix>` appended.
///
/// `photo-1` matches `photo-1-2`, `photo-1-3` and deeper chains such as
/// `photo-1-2-2`. The match is a literal prefix and is approximate: a record
/// whose own name happens to extend another's with a dash is matched too.
pub struct NamePrefixResolver {
    repo: Arc<dyn RecordRepo>,
}

impl NamePrefixResolver {
    pub fn new(repo: Arc<dyn RecordRepo>) -> Self {
        Self { repo }
    }

    /// Ids whose title or name starts with the original's value plus `-`,
    /// in ascending order. Never contains `original.id`.
    pub async fn twins_of(&self, original: &Record) -> SweepResult<Vec<RecordId>> {
        let mut twins = BTreeSet::new();
        for (column, value) in [
            (Column::Title, original.title.as_str()),
            (Column::Name, original.name.as_str()),
        ] {
            twins.extend(self.twins_by(column, value, original.id).await?);
        }
        Ok(twins.into_iter().collect())
    }

    async fn twins_by(
        &self,
        column: Column,
        value: &str,
        original: RecordId,
    ) -> SweepResult<Vec<RecordId>> {
        if value.trim().is_empty() {
            tracing::debug!(record_id = %original, column = %column, "Skipping empty value");
            return Ok(Vec::new());
        }

        let prefix = format!("{value}-");
        let ids = self
            .repo
            .select_ids(vec![
                Condition::starts_with(column, &prefix),
                Condition::ids(Column::Id, Comparator::NotEquals, &[original]),
            ])
            .await?;

        if ids.is_empty() {
            tracing::warn!(
                record_id = %original,
                column = %column,
                prefix = %prefix,
                "Found no twins using '{}' with '{}%'",
                column,
                prefix
            );
        } else {
            tracing::warn!(
                record_id = %original,
                column = %column,
                prefix = %prefix,
                twins = ids.len(),
                "Found some twins using '{}' with '{}%'",
                column,
                prefix
            );
        }
        Ok(ids)
    }
}

/// Finds records sharing a guid with a referenced record.
pub struct GuidResolver {
    repo: Arc<dyn RecordRepo>,
}

impl GuidResolver {
    pub fn new(repo: Arc<dyn RecordRepo>) -> Self {
        Self { repo }
    }

    /// Duplicates of the `referenced` records, in ascending order.
    ///
    /// Every record sharing a guid with a referenced record is a duplicate,
    /// except the referenced records themselves and anything in `canonical`.
    /// Groups of one are not duplicates.
    pub async fn twins_of(
        &self,
        referenced: &[RecordId],
        canonical: &KeepSet,
    ) -> SweepResult<Vec<RecordId>> {
        let protected: HashSet<RecordId> = referenced.iter().copied().collect();
        let mut seen_guids = HashSet::new();
        let mut twins = BTreeSet::new();

        for (id, guid) in self.repo.guids(referenced).await? {
            if guid.is_empty() {
                tracing::debug!(record_id = %id, "Record has no guid");
                continue;
            }
            if !seen_guids.insert(guid.clone()) {
                continue;
            }

            let group = self.repo.ids_with_guid(&guid).await?;
            if group.len() < 2 {
                continue;
            }

            let before = twins.len();
            twins.extend(
                group
                    .into_iter()
                    .filter(|member| !protected.contains(member) && !canonical.contains(*member)),
            );
            tracing::debug!(
                record_id = %id,
                guid = %guid,
                duplicates = twins.len() - before,
                "Resolved guid group"
            );
        }

        Ok(twins.into_iter().collect())
    }
}

//! Scan filters for the batch cursor.
//!
//! Callers hand in free-form `key=value` pairs (from the command line or the
//! config file). Keys containing the multi-value marker `__` whose value is a
//! delimited string are exploded into lists, so `post__in=1,2,3` and a literal
//! list are equivalent. The recognised keys are then mapped onto a typed
//! [`ScanFilter`] so nothing free-form ever reaches SQL text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::RecordId;

/// Marker that flags a filter key as multi-valued.
pub const MULTI_VALUE_MARKER: &str = "__";

/// Error raised while turning raw pairs into a [`ScanFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("malformed filter '{0}', expected key=value")]
    Malformed(String),

    #[error("unsupported filter key '{0}'")]
    UnsupportedKey(String),

    #[error("filter '{key}' expects record ids, got '{value}'")]
    InvalidId { key: String, value: String },

    #[error("filter '{0}' takes a single value")]
    ExpectedSingle(String),

    #[error("filter '{0}' needs at least one record id")]
    EmptyIdList(String),
}

/// A filter value after multi-value explosion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFilterValue {
    Single(String),
    Multi(Vec<String>),
}

impl RawFilterValue {
    fn into_items(self) -> Vec<String> {
        match self {
            Self::Single(value) => vec![value],
            Self::Multi(values) => values,
        }
    }
}

/// Parse one `key=value` argument.
pub fn parse_filter_pair(arg: &str) -> Result<(String, String), FilterError> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| FilterError::Malformed(arg.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(FilterError::Malformed(arg.to_string()));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Explode a delimited string for keys carrying the multi-value marker.
pub fn explode_value(key: &str, value: &str) -> RawFilterValue {
    if key.contains(MULTI_VALUE_MARKER) {
        RawFilterValue::Multi(
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        )
    } else {
        RawFilterValue::Single(value.to_string())
    }
}

/// Typed filter for a primary-record scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFilter {
    /// `post_type` equality.
    pub kind: Option<String>,
    /// `post_status` equality.
    pub status: Option<String>,
    /// Restrict to these ids (`post__in`).
    pub include: Vec<RecordId>,
    /// Skip these ids (`post__not_in`).
    pub exclude: Vec<RecordId>,
    /// Only records that carry this attribute key (`meta_key`).
    pub has_attribute: Option<String>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn include(mut self, ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.include.extend(ids);
        self
    }

    pub fn has_attribute(mut self, key: impl Into<String>) -> Self {
        self.has_attribute = Some(key.into());
        self
    }

    /// True when the filter names explicit ids; such scans are not paginated.
    pub fn targets_explicit_ids(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }

    /// Apply raw `key=value` pairs on top of this filter.
    ///
    /// Supported keys: `post_type`, `post_status`, `post__in`,
    /// `post__not_in`, `meta_key`.
    pub fn apply_pairs<I, K, V>(mut self, pairs: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            let key = key.as_ref();
            let exploded = explode_value(key, value.as_ref());
            match key {
                "post_type" => self.kind = Some(single(key, exploded)?),
                "post_status" => self.status = Some(single(key, exploded)?),
                "meta_key" => self.has_attribute = Some(single(key, exploded)?),
                "post__in" => self.include.extend(ids(key, exploded)?),
                "post__not_in" => self.exclude.extend(ids(key, exploded)?),
                other => return Err(FilterError::UnsupportedKey(other.to_string())),
            }
        }
        Ok(self)
    }
}

fn single(key: &str, value: RawFilterValue) -> Result<String, FilterError> {
    match value {
        RawFilterValue::Single(value) => Ok(value),
        RawFilterValue::Multi(_) => Err(FilterError::ExpectedSingle(key.to_string())),
    }
}

/// An empty list would drop the id restriction and widen the scan.
fn ids(key: &str, value: RawFilterValue) -> Result<Vec<RecordId>, FilterError> {
    let items = value.into_items();
    if items.iter().all(|item| item.trim().is_empty()) {
        return Err(FilterError::EmptyIdList(key.to_string()));
    }
    items
        .into_iter()
        .map(|item| {
            item.parse::<RecordId>().map_err(|_| FilterError::InvalidId {
                key: key.to_string(),
                value: item.clone(),
            })
        })
        .collect()
}

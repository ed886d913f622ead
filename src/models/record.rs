//! Primary record types.
//!
//! A [`Record`] mirrors one row of the primary records table (`wp_posts` in a
//! WordPress install) plus whatever attribute rows were preloaded for it.
//! Records are only ever read and deleted by this crate, never created.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::AttributeValue;

/// Integer identifier of a primary record.
///
/// Identifiers are immutable once assigned by the store. `0` is the
/// "no record" placeholder and is never a valid member of a keep-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// True for the `0` placeholder.
    pub const fn is_placeholder(self) -> bool {
        self.0 == 0
    }

    /// Parse a loosely formatted identifier as found inside attribute values.
    ///
    /// Surrounding whitespace and quotes are ignored. Returns `None` for
    /// anything that is not a positive integer.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        match trimmed.parse::<u64>() {
            Ok(0) | Err(_) => None,
            Ok(id) => Some(Self(id)),
        }
    }

    /// Value to bind against integer id columns.
    ///
    /// SQLite has no unsigned 64-bit type, so ids are bound as `i64` on every
    /// backend; WordPress ids never approach `i64::MAX`.
    pub fn as_i64(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

/// A primary record as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Human-readable title (`post_title`).
    pub title: String,
    /// Slug-like name (`post_name`).
    pub name: String,
    /// Type tag (`post_type`), e.g. `attachment`.
    pub kind: String,
    /// Status (`post_status`), e.g. `inherit`.
    pub status: String,
    /// Globally unique locator (`guid`); translation duplicates share it.
    pub guid: String,
    /// Attribute values preloaded by the batch cursor, keyed by attribute key.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Record {
    /// Look up a preloaded attribute.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// Render a list of ids the way the summary output prints them.
pub fn join_ids(ids: &[RecordId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Sweep and keep-set configuration.
//!
//! # Example
//!
//! ```toml
//! [sweep]
//! posts_per_page = 500
//! post_type = "attachment"
//! post_status = "inherit"
//! delete_concurrency = 2
//! dry_run = true
//!
//! [keep]
//! ids = [194]
//! keys = ["gallery", "_thumbnail_id"]
//! scan_post_type = "page"
//! protected_ids = [12, 13]
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::models::{RecordId, ScanFilter};

/// Settings shared by every sweep operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepSettings {
    /// Records per batch, and the maximum number of ids in one delete chunk.
    /// Default: 500
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u64,

    /// Type of the records being deduplicated.
    /// Default: "attachment"
    #[serde(default = "default_post_type")]
    pub post_type: String,

    /// Status of the records being deduplicated. Empty matches any status.
    /// Default: "inherit"
    #[serde(default = "default_post_status")]
    pub post_status: String,

    /// Delete chunks allowed in flight at once during the keep-set sweep.
    /// Default: 1
    #[serde(default = "default_delete_concurrency")]
    pub delete_concurrency: usize,

    /// Report the statements that would run instead of executing them.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            posts_per_page: default_posts_per_page(),
            post_type: default_post_type(),
            post_status: default_post_status(),
            delete_concurrency: default_delete_concurrency(),
            dry_run: false,
        }
    }
}

impl SweepSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.posts_per_page == 0 {
            return Err(ConfigError::Validation(
                "sweep.posts_per_page must be greater than 0".into(),
            ));
        }
        if self.delete_concurrency == 0 {
            return Err(ConfigError::Validation(
                "sweep.delete_concurrency must be greater than 0".into(),
            ));
        }
        if self.post_type.trim().is_empty() {
            return Err(ConfigError::Validation(
                "sweep.post_type cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Largest number of ids handed to one cascading delete.
    pub fn chunk_size(&self) -> usize {
        usize::try_from(self.posts_per_page).unwrap_or(usize::MAX)
    }

    /// Filter selecting the records being deduplicated.
    pub fn target_filter(&self) -> ScanFilter {
        let filter = ScanFilter::new().kind(&self.post_type);
        if self.post_status.is_empty() {
            filter
        } else {
            filter.status(&self.post_status)
        }
    }
}

fn default_posts_per_page() -> u64 {
    500
}

fn default_post_type() -> String {
    "attachment".to_string()
}

fn default_post_status() -> String {
    "inherit".to_string()
}

fn default_delete_concurrency() -> usize {
    1
}

/// Inputs of the keep-set operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeepSettings {
    /// Seed ids that always survive.
    #[serde(default)]
    pub ids: Vec<RecordId>,

    /// Attribute keys whose values reference ids to keep.
    #[serde(default)]
    pub keys: Vec<String>,

    /// Type of the records whose attributes are scanned. Required by the
    /// keep-set operation.
    #[serde(default)]
    pub scan_post_type: Option<String>,

    /// Optional status of the scanned records.
    #[serde(default)]
    pub scan_post_status: Option<String>,

    /// Ids appended by the built-in protection hook.
    #[serde(default)]
    pub protected_ids: Vec<RecordId>,
}

impl KeepSettings {
    /// Filter over the records whose attributes feed the keep-set, or `None`
    /// when no scan type is configured.
    pub fn scan_filter(&self) -> Option<ScanFilter> {
        let kind = self
            .scan_post_type
            .as_deref()
            .filter(|kind| !kind.trim().is_empty())?;
        let filter = ScanFilter::new().kind(kind);
        Some(match self.scan_post_status.as_deref() {
            Some(status) if !status.is_empty() => filter.status(status),
            _ => filter,
        })
    }
}

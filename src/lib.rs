//! Bounded-memory duplicate record sweeper for WordPress/WPML style stores.
//!
//! Three clean-up operations run over a relational store of primary records,
//! translation links and key/value attributes:
//!
//! - **name twins**: records whose title or slug extends an original's with a
//!   numbered `-<n>` suffix
//! - **keep-set**: every record of the target category not referenced by a
//!   seed list or by the attributes of a scanned category
//! - **guid twins**: records sharing a guid with a record referenced from an
//!   attribute list
//!
//! Records are read in pages through [`sweep::BatchCursor`] and removed with
//! [`sweep::CascadingDeleter`], which always clears dependent rows alongside
//! the primary row. Every operation honours a dry-run flag.

pub mod config;
pub mod db;
pub mod models;
#[cfg(feature = "cli")]
pub mod observability;
pub mod sweep;

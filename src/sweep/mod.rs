//! Bounded-memory duplicate sweeping.
//!
//! A [`BatchCursor`] walks primary records one page at a time. The
//! [`KeepSetBuilder`] folds seed ids and attribute-referenced ids into a
//! [`KeepSet`], the resolvers find twins by name prefix or shared guid, and
//! the [`CascadingDeleter`] removes doomed ids from the primary table and both
//! dependent tables in bounded chunks. [`Sweeper`] wires these into the three
//! operations exposed by the command line.

mod cursor;
mod deleter;
mod error;
mod keep_set;
mod resolver;
mod run;


pub use cursor::{BatchCursor, Pagination, ShrinkFn};
pub use deleter::{CascadingDeleter, DeleteReport, RowsAffected};
pub use error::{SweepError, SweepResult};
pub use keep_set::{HookError, HookFn, IdHook, KeepSet, KeepSetBuilder, KeyHook, ProtectedIds};
pub use resolver::{GuidResolver, NamePrefixResolver};
pub use run::{Operation, SweepReport, Sweeper};

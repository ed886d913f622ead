//! Logging setup for the command-line binary.
//!
//! Structured logs go to stderr in a pretty, compact or JSON format so the
//! run summary printed on stdout stays machine-readable.

mod tracing_init;

pub use tracing_init::*;

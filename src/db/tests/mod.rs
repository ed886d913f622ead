//! Shared database repository test infrastructure
//!
//! This module provides a test harness for running the same test logic against
//! both SQLite and MySQL implementations. Tests are organized as:
//!
//! - **Unit tests (SQLite)**: Fast, in-memory tests that run with every `cargo test`
//! - **Integration tests (MySQL)**: Slower tests using testcontainers, run with `cargo test -- --ignored`
//!
//! # Running tests
//!
//! ```bash
//! cargo test                       # Run fast SQLite tests only
//! cargo test -- --ignored          # Run MySQL integration tests (requires Docker)
//! cargo test -- --include-ignored  # Run all tests
//! ```

pub mod harness;
mod records;

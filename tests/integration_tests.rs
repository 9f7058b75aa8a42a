//! Integration tests for micro-sql.
//!
//! The SQLite and command-loop tests run everywhere. The PostgreSQL tests
//! need a running server: set DATABASE_URL to run them.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;

//! Integration tests for micro-sql.

pub mod postgres_test;
pub mod repl_test;
pub mod sqlite_test;

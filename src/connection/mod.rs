//! Connection management for micro-sql.
//!
//! Resolves connection settings and owns the session connection.

pub mod manager;
pub mod resolve;

pub use manager::ConnectionManager;
pub use resolve::{resolve_connection, NO_BACKEND_MESSAGE};

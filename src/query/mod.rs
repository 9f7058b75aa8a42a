//! Query execution and reporting for micro-sql.
//!
//! This module isolates statement execution, timing and result rendering
//! from the command loop.

pub mod executor;
pub mod render;
pub mod report;

pub use executor::{QueryExecutor, QueryOutcome};
pub use report::{AggregateReport, ExecutionReport};

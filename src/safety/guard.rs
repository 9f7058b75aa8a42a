//! Gate in front of the executor that admits only read statements.

use tracing::debug;

use super::{SqlClassifier, StatementType};
use crate::db::DatabaseBackend;
use crate::error::{MicroError, Result};

/// Message shown for statements the client refuses to run.
pub const REJECTED_MESSAGE: &str =
    "Only SELECT and SHOW statements are allowed. Type 'HELP' for available commands.";

/// Admits a single SELECT, WITH or SHOW statement free of data-modifying parts.
#[derive(Debug)]
pub struct ReadOnlyGuard {
    classifier: SqlClassifier,
}

impl ReadOnlyGuard {
    pub fn new(backend: DatabaseBackend) -> Self {
        Self {
            classifier: SqlClassifier::new(backend),
        }
    }

    /// Returns the statement type when `sql` may run, or a `ReadOnly` error.
    pub fn check(&self, sql: &str) -> Result<StatementType> {
        let classification = self.classifier.classify(sql)?;
        if classification.is_read_only() {
            Ok(classification.statement_type)
        } else {
            debug!(
                "Rejected {} statement ({})",
                classification.statement_type, classification.level
            );
            Err(MicroError::read_only(REJECTED_MESSAGE))
        }
    }
}

//! Plain-text transcript of a statement's output.
//!
//! Lines are buffered and only handed to the console once the whole call has
//! succeeded.

use super::report::{AggregateReport, ExecutionReport};
use crate::db::Row;

/// Width of the dashed separator around the header and at the end.
pub const SEPARATOR_WIDTH: usize = 60;

/// Buffered output for one executor call.
#[derive(Debug, Default)]
pub struct Transcript {
    buf: String,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&mut self, text: &str) {
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    fn separator(&mut self) {
        self.line(&"-".repeat(SEPARATOR_WIDTH));
    }

    /// Separator, tab-joined column names, separator.
    pub fn header(&mut self, columns: &[String]) {
        self.separator();
        self.line(&columns.join("\t"));
        self.separator();
    }

    /// One row as tab-joined display strings.
    pub fn row(&mut self, row: &Row) {
        let cells: Vec<String> = row.iter().map(|v| v.to_display_string()).collect();
        self.line(&cells.join("\t"));
    }

    pub fn truncated(&mut self, row_limit: usize) {
        self.line(&format!("[...] Output truncated at {row_limit} rows."));
    }

    pub fn summary(&mut self, report: &ExecutionReport) {
        self.line(&report.to_string());
    }

    pub fn average(&mut self, aggregate: &AggregateReport) {
        self.line(&aggregate.to_string());
    }

    /// Closing separator.
    pub fn finish(&mut self) {
        self.separator();
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

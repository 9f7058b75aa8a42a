//! Error types for micro-sql.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for micro-sql operations.
#[derive(Error, Debug)]
pub enum MicroError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Errors raised while issuing a query to the driver.
    #[error("Query error: {0}")]
    Query(String),

    /// Errors raised while enumerating the columns of a result set.
    #[error("Error fetching columns: {0}")]
    ColumnFetch(String),

    /// Errors raised while reading or decoding a row.
    #[error("Row scan error: {0}")]
    RowScan(String),

    /// Invalid session setting (e.g. `SET MICRO LIMIT=0`).
    #[error("{0}")]
    Session(String),

    /// Statement rejected because it is not a read statement.
    #[error("{0}")]
    ReadOnly(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Terminal or file I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MicroError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a column fetch error with the given message.
    pub fn column_fetch(msg: impl Into<String>) -> Self {
        Self::ColumnFetch(msg.into())
    }

    /// Creates a row scan error with the given message.
    pub fn row_scan(msg: impl Into<String>) -> Self {
        Self::RowScan(msg.into())
    }

    /// Creates a session error with the given message.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Creates a read-only violation with the given message.
    pub fn read_only(msg: impl Into<String>) -> Self {
        Self::ReadOnly(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::ColumnFetch(_) => "Column Fetch Error",
            Self::RowScan(_) => "Row Scan Error",
            Self::Session(_) => "Session Error",
            Self::ReadOnly(_) => "Read-Only Violation",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true if the command loop can carry on after this error.
    ///
    /// Everything except connection, I/O and internal failures only aborts
    /// the current command.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Connection(_) | Self::Io(_) | Self::Internal(_))
    }
}

/// Result type alias using MicroError.
pub type Result<T> = std::result::Result<T, MicroError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = MicroError::connection("Cannot connect to localhost:5432");
        assert_eq!(
            err.to_string(),
            "Connection error: Cannot connect to localhost:5432"
        );
        assert_eq!(err.category(), "Connection Error");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_display_query() {
        let err = MicroError::query("relation \"userz\" does not exist");
        assert_eq!(
            err.to_string(),
            "Query error: relation \"userz\" does not exist"
        );
        assert_eq!(err.category(), "Query Error");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_display_column_fetch() {
        let err = MicroError::column_fetch("statement has no result columns");
        assert_eq!(
            err.to_string(),
            "Error fetching columns: statement has no result columns"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_display_row_scan() {
        let err = MicroError::row_scan("invalid utf-8");
        assert_eq!(err.to_string(), "Row scan error: invalid utf-8");
        assert_eq!(err.category(), "Row Scan Error");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_session_and_read_only_display_bare_message() {
        let err = MicroError::session("Invalid value. Must be a positive integer.");
        assert_eq!(err.to_string(), "Invalid value. Must be a positive integer.");

        let err = MicroError::read_only("Only SELECT and SHOW statements are allowed");
        assert_eq!(
            err.to_string(),
            "Only SELECT and SHOW statements are allowed"
        );
    }

    #[test]
    fn test_error_from_io() {
        let err: MicroError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(err.category(), "I/O Error");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MicroError>();
    }
}

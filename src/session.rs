//! Per-session settings changed with `SET MICRO ...`.

use std::fmt;

use crate::error::{MicroError, Result};

/// Default number of rows printed per statement.
pub const DEFAULT_ROW_LIMIT: usize = 10;

/// Default number of executions per statement.
pub const DEFAULT_EXECUTION_COUNT: usize = 1;

const INVALID_VALUE: &str = "Invalid value. Must be a positive integer.";

/// A setting adjustable from the command loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    /// `SET MICRO COUNT=N`: how many times each statement runs.
    Count,
    /// `SET MICRO LIMIT=N`: how many rows are printed.
    Limit,
}

impl Setting {
    /// Parses the setting keyword (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "COUNT" => Some(Self::Count),
            "LIMIT" => Some(Self::Limit),
            _ => None,
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "COUNT",
            Self::Limit => "LIMIT",
        })
    }
}

/// Session settings read by the query executor on every call.
///
/// Both values are always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    row_limit: usize,
    execution_count: usize,
}

impl SessionState {
    /// Creates a session state, rejecting zero values.
    pub fn new(row_limit: usize, execution_count: usize) -> Result<Self> {
        if row_limit == 0 || execution_count == 0 {
            return Err(MicroError::session(INVALID_VALUE));
        }
        Ok(Self {
            row_limit,
            execution_count,
        })
    }

    /// Maximum number of rows rendered per statement.
    pub fn row_limit(&self) -> usize {
        self.row_limit
    }

    /// Number of times each statement is executed.
    pub fn execution_count(&self) -> usize {
        self.execution_count
    }

    /// Updates a setting from its raw textual value.
    ///
    /// On error the previous value is kept. Returns the confirmation message.
    pub fn set(&mut self, setting: Setting, raw: &str) -> Result<String> {
        let value = parse_positive(raw)?;
        let message = match setting {
            Setting::Count => {
                self.execution_count = value;
                format!("Execution count set to {value}")
            }
            Setting::Limit => {
                self.row_limit = value;
                format!("Row limit set to {value}")
            }
        };
        Ok(message)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
            execution_count: DEFAULT_EXECUTION_COUNT,
        }
    }
}

/// Parses a strictly positive integer.
pub fn parse_positive(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(MicroError::session(INVALID_VALUE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = SessionState::default();
        assert_eq!(state.row_limit(), 10);
        assert_eq!(state.execution_count(), 1);
    }

    #[test]
    fn test_new_rejects_zero() {
        assert!(SessionState::new(0, 1).is_err());
        assert!(SessionState::new(1, 0).is_err());
        assert!(SessionState::new(5, 2).is_ok());
    }

    #[test]
    fn test_set_updates_value() {
        let mut state = SessionState::default();
        assert_eq!(state.set(Setting::Count, "3").unwrap(), "Execution count set to 3");
        assert_eq!(state.set(Setting::Limit, "50").unwrap(), "Row limit set to 50");
        assert_eq!(state.execution_count(), 3);
        assert_eq!(state.row_limit(), 50);
    }

    #[test]
    fn test_invalid_set_keeps_previous_value() {
        let mut state = SessionState::new(7, 2).unwrap();
        for raw in ["0", "-5", "abc", "", "2.5"] {
            let err = state.set(Setting::Limit, raw).unwrap_err();
            assert!(matches!(err, MicroError::Session(_)));
            assert_eq!(err.to_string(), "Invalid value. Must be a positive integer.");
            let err = state.set(Setting::Count, raw).unwrap_err();
            assert!(matches!(err, MicroError::Session(_)));
        }
        assert_eq!(state, SessionState::new(7, 2).unwrap());
    }

    #[test]
    fn test_setting_parse() {
        assert_eq!(Setting::parse("count"), Some(Setting::Count));
        assert_eq!(Setting::parse("LIMIT"), Some(Setting::Limit));
        assert_eq!(Setting::parse("timeout"), None);
    }
}

//! Help text for the command loop.

use crate::query::render::SEPARATOR_WIDTH;
use crate::session::SessionState;

/// Builds the help text, showing the current session values.
pub fn help_text(session: &SessionState) -> String {
    let separator = "-".repeat(SEPARATOR_WIDTH);
    format!(
        "\nAvailable Commands:\n\
         {separator}\n\
         HELP                 - Display this message\n\
         EXIT                 - End of Line\n\
         SET MICRO COUNT=N    - Set number of iterations for queries   (Currently {count})\n\
         SET MICRO LIMIT=N    - Set rows displayed for first iteration (Currently {limit})\n\
         SELECT ...           - Execute the given SELECT query\n\
         SHOW ...             - Execute the given SHOW statement\n\
         {separator}\n",
        count = session.execution_count(),
        limit = session.row_limit(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_shows_current_values() {
        let session = SessionState::new(25, 4).unwrap();
        let text = help_text(&session);
        assert!(text.contains("SET MICRO COUNT=N    - Set number of iterations for queries   (Currently 4)"));
        assert!(text.contains("(Currently 25)"));
        assert!(text.starts_with("\nAvailable Commands:\n"));
    }
}

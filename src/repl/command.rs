//! Classification of command-loop input lines.

use std::sync::LazyLock;

use regex::Regex;

use crate::session::Setting;

/// Words that end the session (compared case-insensitively).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "\\q", ":wq", ".quit"];

static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*=\s*").expect("assignment pattern is valid"));

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank line.
    Empty,
    /// `exit`, `quit`, `\q`, `:wq`, `.quit`.
    Exit,
    /// `HELP`.
    Help,
    /// `SET MICRO COUNT=N` or `SET MICRO LIMIT=N`; the value is unvalidated.
    Set { setting: Setting, value: String },
    /// `SET MICRO <name>=N` for a name that is not a setting.
    UnknownSetting(String),
    /// Anything else, to be checked by the read-only guard.
    Statement(String),
}

/// Parses one input line.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }

    let bare = trimmed.trim_end_matches(';').trim_end();
    let lower = bare.to_lowercase();

    if EXIT_COMMANDS.contains(&lower.as_str()) {
        return Command::Exit;
    }
    if lower == "help" {
        return Command::Help;
    }
    if let Some(command) = parse_set(bare) {
        return command;
    }

    Command::Statement(trimmed.to_string())
}

/// Recognizes `SET MICRO <setting> [=] <value>` with optional spaces around `=`.
fn parse_set(line: &str) -> Option<Command> {
    let normalized = ASSIGNMENT.replace_all(line, " ");
    let words: Vec<&str> = normalized.split_whitespace().collect();

    match words.as_slice() {
        [set, micro, name, value]
            if set.eq_ignore_ascii_case("SET") && micro.eq_ignore_ascii_case("MICRO") =>
        {
            Some(match Setting::parse(name) {
                Some(setting) => Command::Set {
                    setting,
                    value: value.to_string(),
                },
                None => Command::UnknownSetting(name.to_string()),
            })
        }
        _ => None,
    }
}

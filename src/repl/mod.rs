//! Interactive command loop.
//!
//! Reads lines, classifies them, updates the session or hands read
//! statements to the executor, and prints the results.

mod command;
mod help;
pub mod shutdown;

pub use command::{parse_command, Command};
pub use help::help_text;

use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, error, warn};

use crate::db::{DatabaseBackend, DatabaseClient};
use crate::error::{MicroError, Result};
use crate::query::QueryExecutor;
use crate::safety::ReadOnlyGuard;
use crate::session::SessionState;

/// Printed when the loop ends on an exit command or end of input.
pub const EXIT_MESSAGE: &str = "End of line.";

/// What the loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The line was handled.
    Continue,
    /// The line produced an error message; the loop carries on.
    Failed,
    /// The line failed in a way that ends the session (connection lost).
    Fatal,
    /// The session is over.
    Exit,
}

/// Result of reading one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    /// Ctrl-D or end of input.
    Eof,
}

/// Source of input lines.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;

    /// Records a line in the history, if the source keeps one.
    fn add_history(&mut self, _line: &str) {}
}

/// Line editor with persistent history, backed by rustyline.
pub struct HistoryEditor {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
}

impl HistoryEditor {
    /// Creates an editor, loading history from `history_path` if it exists.
    pub fn new(history_path: Option<PathBuf>) -> Result<Self> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        if let Some(path) = &history_path {
            if path.exists() {
                if let Err(e) = editor.load_history(path) {
                    warn!("Could not load history from {}: {}", path.display(), e);
                }
            }
        }
        Ok(Self {
            editor,
            history_path,
        })
    }

    /// Default history location: `<state dir>/micro-sql/history.txt`.
    pub fn default_history_path() -> Option<PathBuf> {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|dir| dir.join("micro-sql").join("history.txt"))
    }

    /// Writes the history file.
    pub fn save(&mut self) {
        let Some(path) = &self.history_path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create history directory: {}", e);
                return;
            }
        }
        if let Err(e) = self.editor.save_history(path) {
            warn!("Could not save history to {}: {}", path.display(), e);
        }
    }
}

impl LineSource for HistoryEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        // rustyline blocks on the terminal; keep the runtime's other tasks
        // (signal handling) running meanwhile.
        let line = tokio::task::block_in_place(|| self.editor.readline(prompt));
        match line {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(readline_error(e)),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            debug!("Could not add history entry: {}", e);
        }
    }
}

fn readline_error(error: ReadlineError) -> MicroError {
    match error {
        ReadlineError::Io(e) => MicroError::Io(e),
        other => MicroError::Io(std::io::Error::other(other.to_string())),
    }
}

/// Prompt shown before each line: `micro-<backend> (HH:MM:SS)> `.
pub fn prompt(backend: DatabaseBackend) -> String {
    format!("micro-{} ({})> ", backend, Local::now().format("%H:%M:%S"))
}

/// The command loop over one session connection.
pub struct Repl<'a> {
    db: &'a dyn DatabaseClient,
    guard: ReadOnlyGuard,
    session: SessionState,
}

impl<'a> Repl<'a> {
    pub fn new(db: &'a dyn DatabaseClient, session: SessionState) -> Self {
        Self {
            db,
            guard: ReadOnlyGuard::new(db.backend()),
            session,
        }
    }

    /// Current session settings.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Handles one input line, writing everything it prints to `out`.
    ///
    /// Only failures to write to `out` are returned as errors. Statement
    /// and setting errors are printed and reported as [`Flow::Failed`], or
    /// [`Flow::Fatal`] when the session connection is gone.
    pub async fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        match parse_command(line) {
            Command::Empty => Ok(Flow::Continue),
            Command::Exit => {
                writeln!(out, "{EXIT_MESSAGE}")?;
                Ok(Flow::Exit)
            }
            Command::Help => {
                write!(out, "{}", help_text(&self.session))?;
                Ok(Flow::Continue)
            }
            Command::Set { setting, value } => match self.session.set(setting, &value) {
                Ok(message) => {
                    debug!("SET MICRO {} = {}", setting, value);
                    writeln!(out, "{message}")?;
                    Ok(Flow::Continue)
                }
                Err(e) => {
                    writeln!(out, "{e}")?;
                    Ok(Flow::Failed)
                }
            },
            Command::UnknownSetting(name) => {
                let e = MicroError::session(format!(
                    "Unknown setting '{name}'. Available settings: COUNT, LIMIT."
                ));
                writeln!(out, "{e}")?;
                Ok(Flow::Failed)
            }
            Command::Statement(sql) => self.run_statement(&sql, out).await,
        }
    }

    async fn run_statement<W: Write>(&mut self, sql: &str, out: &mut W) -> Result<Flow> {
        if let Err(e) = self.guard.check(sql) {
            writeln!(out, "{e}")?;
            return Ok(Flow::Failed);
        }

        let executor = QueryExecutor::new(self.db);
        match executor.execute(sql, &self.session).await {
            Ok(outcome) => {
                out.write_all(outcome.transcript.as_bytes())?;
                out.flush()?;
                Ok(Flow::Continue)
            }
            Err(e) => {
                error!("{}: {}", e.category(), e);
                writeln!(out, "{e}")?;
                if e.is_recoverable() {
                    Ok(Flow::Failed)
                } else {
                    Ok(Flow::Fatal)
                }
            }
        }
    }

    /// Runs the loop until an exit command, Ctrl-C, end of input or a fatal
    /// error, and returns how it ended ([`Flow::Exit`] or [`Flow::Fatal`]).
    pub async fn run<L, W>(&mut self, source: &mut L, out: &mut W) -> Result<Flow>
    where
        L: LineSource,
        W: Write,
    {
        loop {
            let prompt = prompt(self.db.backend());
            match source.read_line(&prompt)? {
                ReadOutcome::Line(line) => {
                    if !line.trim().is_empty() {
                        source.add_history(line.trim());
                    }
                    match self.handle_line(&line, out).await? {
                        Flow::Exit => break,
                        Flow::Fatal => return Ok(Flow::Fatal),
                        Flow::Continue | Flow::Failed => {}
                    }
                }
                ReadOutcome::Interrupted => {
                    writeln!(out, "{}", shutdown::INTERRUPT_MESSAGE)?;
                    break;
                }
                ReadOutcome::Eof => {
                    writeln!(out, "{EXIT_MESSAGE}")?;
                    break;
                }
            }
        }
        Ok(Flow::Exit)
    }
}

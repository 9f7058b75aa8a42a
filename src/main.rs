//! micro-sql - a micro read-only SQL client that times every query.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use micro_sql::cli::Cli;
use micro_sql::config::{Config, ConnectionConfig};
use micro_sql::connection::{resolve_connection, ConnectionManager};
use micro_sql::db::{DatabaseBackend, DatabaseClient, MockDatabaseClient};
use micro_sql::error::{MicroError, Result};
use micro_sql::logging;
use micro_sql::repl::{shutdown, Flow, HistoryEditor, Repl};
use micro_sql::session::SessionState;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if cli.execute.is_some() {
        logging::init_stderr_logging();
    } else {
        logging::init_file_logging();
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let session = SessionState::new(
        cli.limit.unwrap_or(config.session.row_limit),
        cli.count.unwrap_or(config.session.execution_count),
    )?;

    let mut manager = ConnectionManager::new();
    if cli.mock_db {
        info!("Using mock database");
        let backend = cli.backend.unwrap_or_default();
        let mock: Arc<dyn DatabaseClient> =
            Arc::new(MockDatabaseClient::new().with_backend(backend));
        let connection = ConnectionConfig {
            backend,
            database: Some("mock".to_string()),
            ..Default::default()
        };
        manager.attach(mock, connection).await?;
    } else {
        let program = std::env::args().next().unwrap_or_default();
        let mut connection = resolve_connection(&cli, &config, &program)?;
        if needs_password_prompt(&cli, &connection) {
            connection.password = Some(rpassword::prompt_password("Enter password: ")?);
        }
        manager.connect(connection).await?;
    }

    let db = manager
        .shared()
        .ok_or_else(|| MicroError::internal("No active connection after connect"))?;

    let mut stdout = std::io::stdout();
    if let Some(banner) = manager.banner() {
        writeln!(stdout, "{banner}")?;
    }

    let token = CancellationToken::new();
    shutdown::spawn_signal_listener(token.clone());
    shutdown::spawn_shutdown_watcher(token.clone(), Arc::clone(&db));

    let mut repl = Repl::new(db.as_ref(), session);
    let flow = match &cli.execute {
        Some(sql) => repl.handle_line(sql, &mut stdout).await?,
        None => {
            let mut editor = HistoryEditor::new(HistoryEditor::default_history_path())?;
            let result = repl.run(&mut editor, &mut stdout).await;
            editor.save();
            result?
        }
    };
    let code = match flow {
        Flow::Failed | Flow::Fatal => ExitCode::FAILURE,
        Flow::Continue | Flow::Exit => ExitCode::SUCCESS,
    };

    manager.close().await?;
    Ok(code)
}

/// Prompts for network backends when no password was given and `-w` is off.
fn needs_password_prompt(cli: &Cli, connection: &ConnectionConfig) -> bool {
    connection.backend != DatabaseBackend::Sqlite
        && connection.password.is_none()
        && !cli.no_password
}

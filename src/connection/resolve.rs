//! Resolution of the session's connection settings.
//!
//! Precedence, highest first: command line, named connection, `default`
//! connection from the config file, environment variables.

use tracing::debug;

use crate::cli::Cli;
use crate::config::{Config, ConnectionConfig};
use crate::db::DatabaseBackend;
use crate::error::{MicroError, Result};

/// Shown when nothing determines which backend to use.
pub const NO_BACKEND_MESSAGE: &str = "Please use micro-mysql or micro-psql, or pass --backend.";

/// Resolves the final connection configuration from CLI args, config file, and environment.
///
/// `program` is the name the binary was invoked as (`argv[0]`).
pub fn resolve_connection(cli: &Cli, config: &Config, program: &str) -> Result<ConnectionConfig> {
    resolve_with_env(cli, config, program, |key| std::env::var(key).ok())
}

/// Same as [`resolve_connection`] with an explicit environment lookup.
pub fn resolve_with_env<F>(
    cli: &Cli,
    config: &Config,
    program: &str,
    env: F,
) -> Result<ConnectionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let from_cli = cli.to_connection_config()?;

    let named = match cli.connection_name() {
        Some(name) => Some(config.get_connection(Some(name)).ok_or_else(|| {
            MicroError::config(format!("Connection '{name}' not found in config file"))
        })?),
        None => None,
    };
    let default = if named.is_none() {
        config.get_connection(None)
    } else {
        None
    };

    let backend = resolve_backend(cli, named, default, program)?;
    debug!("Resolved backend: {}", backend);

    let mut resolved = ConnectionConfig {
        backend,
        ..Default::default()
    };

    // The default connection only supplies settings for its own backend.
    if let Some(default) = default.filter(|d| d.backend == backend) {
        resolved.merge(default);
    }
    if let Some(named) = named {
        resolved.merge(named);
    }
    if let Some(from_cli) = &from_cli {
        resolved.merge(from_cli);
    }
    resolved.apply_defaults_from(env);

    if backend == DatabaseBackend::Sqlite && resolved.database.is_none() {
        return Err(MicroError::config("A SQLite database file is required"));
    }

    Ok(resolved)
}

/// Picks the backend: `--backend`, then the URL scheme, then an explicitly
/// named connection, then the program name, then the `default` connection.
fn resolve_backend(
    cli: &Cli,
    named: Option<&ConnectionConfig>,
    default: Option<&ConnectionConfig>,
    program: &str,
) -> Result<DatabaseBackend> {
    if let Some(backend) = cli.backend {
        return Ok(backend);
    }
    if let Some(backend) = cli.url_backend()? {
        return Ok(backend);
    }
    named
        .map(|c| c.backend)
        .or_else(|| DatabaseBackend::from_program_name(program))
        .or_else(|| default.map(|c| c.backend))
        .ok_or_else(|| MicroError::config(NO_BACKEND_MESSAGE))
}

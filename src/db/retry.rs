//! Connection retries and driver error mapping shared by the sqlx clients.

use std::time::Duration;

use sqlx::pool::PoolOptions;
use sqlx::{Database, Pool};
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::MicroError;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Time to wait for the session connection to become available.
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Pool options for the session: exactly one connection, opened eagerly.
pub(crate) fn session_pool_options<DB: Database>() -> PoolOptions<DB> {
    PoolOptions::<DB>::new()
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
}

/// Opens the session pool, retrying transient failures with exponential backoff.
pub(crate) async fn connect_with_retry<DB: Database>(
    options: PoolOptions<DB>,
    connect_options: <DB::Connection as sqlx::Connection>::Options,
    config: &ConnectionConfig,
) -> Result<Pool<DB>, MicroError> {
    let mut last_error = None;
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

        match options.clone().connect_with(connect_options.clone()).await {
            Ok(pool) => {
                debug!("Successfully connected to database");
                return Ok(pool);
            }
            Err(e) => {
                let is_transient = is_transient_error(&e);
                last_error = Some(e);

                if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                } else {
                    break;
                }
            }
        }
    }

    match last_error {
        Some(error) => Err(map_connection_error(error, config)),
        None => Err(MicroError::internal("no connection attempt was made")),
    }
}

/// Determines if an error is transient and worth retrying.
pub(crate) fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("access denied")
        || error_str.contains("does not exist")
        || error_str.contains("unknown database")
        || error_str.contains("ssl")
        || error_str.contains("tls")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
pub(crate) fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> MicroError {
    let host = config.host_or_default();
    let port = config.effective_port().unwrap_or_default();
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        MicroError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("access denied")
    {
        MicroError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if (error_str.contains("does not exist") && error_str.contains("database"))
        || error_str.contains("unknown database")
        || error_str.contains("unable to open database file")
    {
        MicroError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        MicroError::connection(
            "Server requires SSL. Add '?sslmode=require' to connection string.".to_string(),
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        MicroError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        MicroError::connection(error.to_string())
    }
}

/// Maps an error raised while issuing a query.
///
/// Losing the session connection is a connection error; everything else,
/// including errors reported by the server, is a query error.
pub(crate) fn map_query_error(error: &sqlx::Error) -> MicroError {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            MicroError::connection(format!("Lost connection to the database: {error}"))
        }
        _ => MicroError::query(format_query_error(error)),
    }
}

/// Formats a query error, keeping the server's message and SQLSTATE when present.
pub(crate) fn format_query_error(error: &sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => {
            let mut result = String::from("ERROR: ");
            result.push_str(db_error.message());
            if let Some(code) = db_error.code() {
                result.push_str(" (SQLSTATE ");
                result.push_str(&code);
                result.push(')');
            }

            if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
            {
                if let Some(detail) = pg_error.detail() {
                    result.push_str("\n  DETAIL: ");
                    result.push_str(detail);
                }
                if let Some(hint) = pg_error.hint() {
                    result.push_str("\n  HINT: ");
                    result.push_str(hint);
                }
            }

            result
        }
        None => error.to_string(),
    }
}

//! Database abstraction layer for micro-sql.
//!
//! Provides a trait-based driver interface: a [`DatabaseClient`] issues
//! queries and hands back a forward-only [`ResultCursor`]. Concrete backends
//! are built on sqlx; the mock client is used for tests and `--mock-db`.

mod cursor;
mod mock;
mod mysql;
mod postgres;
mod retry;
mod sqlite;
mod types;

pub use mock::MockDatabaseClient;
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use types::{Row, Value};

use crate::config::ConnectionConfig;
use crate::error::{MicroError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// Supported database backends.
///
/// Selected once when the session starts; every query afterwards goes
/// through the same client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    #[serde(alias = "mariadb")]
    Mysql,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string for configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns the name shown in the prompt and connection banner.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "psql" | "pg" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::Mysql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Infers the backend from the executable name, so the binary can be
    /// installed as `micro-psql`, `micro-mysql` or `micro-sqlite`.
    pub fn from_program_name(program: &str) -> Option<Self> {
        let name = Path::new(program)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(program)
            .to_lowercase();

        if name.ends_with("psql") || name.ends_with("postgres") {
            Some(Self::Postgres)
        } else if name.ends_with("mysql") || name.ends_with("mariadb") {
            Some(Self::Mysql)
        } else if name.ends_with("sqlite") || name.ends_with("sqlite3") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }

    /// Returns the default port for this backend, if it is network based.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::Mysql => Some(3306),
            Self::Sqlite => None,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns the statement used to probe the server version.
    pub fn version_sql(&self) -> &'static str {
        match self {
            Self::Postgres => "SELECT CURRENT_SETTING('server_version')",
            Self::Mysql => "SELECT VERSION()",
            Self::Sqlite => "SELECT SQLITE_VERSION()",
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Creates a database client for the given configuration.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    match config.backend {
        DatabaseBackend::Postgres => Ok(Box::new(PostgresClient::connect(config).await?)),
        DatabaseBackend::Mysql => Ok(Box::new(MySqlClient::connect(config).await?)),
        DatabaseBackend::Sqlite => Ok(Box::new(SqliteClient::connect(config).await?)),
    }
}

/// Trait defining the interface for database clients.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Returns the backend this client talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Issues a query and returns a cursor over its result set.
    ///
    /// Returns once the server has produced the first row (or reported an
    /// empty result), so the elapsed time of this call is the query latency.
    async fn query<'a>(&'a self, sql: &'a str) -> Result<Box<dyn ResultCursor + 'a>>;

    /// Runs the backend's version probe and returns the reported version.
    async fn server_version(&self) -> Result<String> {
        let mut cursor = self.query(self.backend().version_sql()).await?;
        match cursor.next_row().await? {
            Some(row) => row
                .first()
                .map(Value::to_display_string)
                .ok_or_else(|| MicroError::query("version probe returned an empty row")),
            None => Err(MicroError::query("version probe returned no rows")),
        }
    }

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

/// A forward-only cursor over the rows of one result set.
///
/// Dropping the cursor releases it and its driver-side resources.
#[async_trait]
pub trait ResultCursor: Send {
    /// Returns the column names of the result set.
    fn columns(&self) -> Result<Vec<String>>;

    /// Advances the cursor and scans the next row, or returns `None` at the end.
    async fn next_row(&mut self) -> Result<Option<Row>>;
}

//! SQLite database client implementation.
//!
//! Opens the database file read-only. Values are decoded by their runtime
//! storage class, since SQLite columns are not strictly typed.

use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::{Column as _, Executor, Statement as _};

use super::cursor::{decode_column, decode_row, unsupported, SqlxCursor};
use super::retry::{
    connect_with_retry, format_query_error, map_query_error, session_pool_options,
};
use super::{DatabaseBackend, DatabaseClient, ResultCursor, Row, Value};
use crate::config::ConnectionConfig;
use crate::error::{MicroError, Result};

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens the database file in read-only mode.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let options = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| MicroError::config(format!("Invalid connection string: {e}")))?
            .read_only(true);

        let pool = connect_with_retry(session_pool_options(), options, config).await?;
        Ok(Self { pool })
    }

    async fn describe_columns(&self, sql: &str) -> Result<Vec<String>> {
        let statement = (&self.pool)
            .prepare(sql)
            .await
            .map_err(|e| MicroError::column_fetch(format_query_error(&e)))?;
        Ok(statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn query<'a>(&'a self, sql: &'a str) -> Result<Box<dyn ResultCursor + 'a>> {
        let mut stream = sqlx::query(sql).fetch(&self.pool);
        let first = stream
            .try_next()
            .await
            .map_err(|e| map_query_error(&e))?;

        match first {
            Some(row) => Ok(Box::new(SqlxCursor::new(stream, row, convert_row))),
            None => {
                drop(stream);
                let columns = self.describe_columns(sql).await?;
                Ok(Box::new(SqlxCursor::<SqliteRow>::empty(columns, convert_row)))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn convert_row(row: &SqliteRow) -> Result<Row> {
    decode_row(row, convert_value)
}

fn convert_value(row: &SqliteRow, index: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "INTEGER" => Value::Int(decode_column(row, index)?),
        "REAL" => Value::Float(decode_column(row, index)?),
        "BLOB" => Value::Bytes(decode_column(row, index)?),
        _ => match decode_column::<_, String>(row, index) {
            Ok(text) => Value::String(text),
            Err(_) => unsupported(type_name),
        },
    };
    Ok(value)
}

//! MySQL / MariaDB database client implementation.

use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlRow};
use sqlx::{Column as _, Executor, Statement as _};
use tracing::debug;

use super::cursor::{
    decode_column, decode_column_unchecked, decode_row, unsupported, SqlxCursor,
};
use super::retry::{
    connect_with_retry, format_query_error, map_query_error, session_pool_options,
};
use super::{DatabaseBackend, DatabaseClient, ResultCursor, Row, Value};
use crate::config::ConnectionConfig;
use crate::error::{MicroError, Result};

/// MySQL database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    /// Connects to MySQL and marks the session read-only.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let options = MySqlConnectOptions::from_str(&conn_str)
            .map_err(|e| MicroError::config(format!("Invalid connection string: {e}")))?;

        let pool_options = session_pool_options::<MySql>().after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                Ok(())
            })
        });

        let pool = connect_with_retry(pool_options, options, config).await?;
        Ok(Self { pool })
    }

    /// Looks up the column names of a statement that produced no rows.
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
impl DatabaseClient for MySqlClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Mysql
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
                Ok(Box::new(SqlxCursor::<MySqlRow>::empty(columns, convert_row)))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn convert_row(row: &MySqlRow) -> Result<Row> {
    decode_row(row, convert_value)
}

fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "BOOLEAN" => Value::Bool(decode_column(row, index)?),
        "TINYINT" => Value::Int(decode_column::<_, i8>(row, index)?.into()),
        "SMALLINT" => Value::Int(decode_column::<_, i16>(row, index)?.into()),
        "MEDIUMINT" | "INT" => Value::Int(decode_column::<_, i32>(row, index)?.into()),
        "BIGINT" => Value::Int(decode_column(row, index)?),
        "TINYINT UNSIGNED" => Value::Int(decode_column::<_, u8>(row, index)?.into()),
        "SMALLINT UNSIGNED" => Value::Int(decode_column::<_, u16>(row, index)?.into()),
        "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => {
            Value::Int(decode_column::<_, u32>(row, index)?.into())
        }
        "BIGINT UNSIGNED" => Value::from(decode_column::<_, u64>(row, index)?),
        "FLOAT" => Value::Float(decode_column::<_, f32>(row, index)?.into()),
        "DOUBLE" => Value::Float(decode_column(row, index)?),
        // DECIMAL and JSON travel as text in both protocols.
        "DECIMAL" | "JSON" => Value::String(decode_column_unchecked(row, index)?),
        "DATE" => Value::String(decode_column::<_, chrono::NaiveDate>(row, index)?.to_string()),
        "TIME" => Value::String(decode_column::<_, chrono::NaiveTime>(row, index)?.to_string()),
        "DATETIME" => Value::String(
            decode_column::<_, chrono::NaiveDateTime>(row, index)?.to_string(),
        ),
        "TIMESTAMP" => Value::String(
            decode_column::<_, chrono::DateTime<chrono::Utc>>(row, index)?.to_string(),
        ),
        "YEAR" => match decode_column::<_, u16>(row, index) {
            Ok(year) => Value::Int(year.into()),
            Err(_) => unsupported(type_name),
        },
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => Value::Bytes(decode_column_unchecked(row, index)?),
        // CHAR, VARCHAR, TEXT, ENUM, SET; SHOW output often arrives with a
        // binary collation, so fall back to raw bytes.
        _ => match decode_column::<_, String>(row, index) {
            Ok(text) => Value::String(text),
            Err(_) => match decode_column_unchecked::<_, Vec<u8>>(row, index) {
                Ok(bytes) => Value::Bytes(bytes),
                Err(_) => {
                    debug!("No text decoding for MySQL type {}", type_name);
                    unsupported(type_name)
                }
            },
        },
    };
    Ok(value)
}

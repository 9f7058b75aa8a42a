//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::types::{Oid, PgInterval, PgTimeTz};
use sqlx::postgres::{PgConnectOptions, PgPool, PgRow, PgTypeKind};
use sqlx::{Column as _, Executor, Row as _, Statement as _, ValueRef as _};
use tracing::debug;
use uuid::Uuid;

use super::cursor::{decode_column, decode_column_unchecked, decode_row, unsupported, SqlxCursor};
use super::retry::{
    connect_with_retry, format_query_error, map_query_error, session_pool_options,
};
use super::{DatabaseBackend, DatabaseClient, ResultCursor, Row, Value};
use crate::config::ConnectionConfig;
use crate::error::{MicroError, Result};

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Connects to PostgreSQL with every transaction read-only by default.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let options = PgConnectOptions::from_str(&conn_str)
            .map_err(|e| MicroError::config(format!("Invalid connection string: {e}")))?
            .options([("default_transaction_read_only", "on")]);

        let pool = connect_with_retry(session_pool_options(), options, config).await?;
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
impl DatabaseClient for PostgresClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
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
                // The stream holds the session's only connection until dropped.
                drop(stream);
                debug!("Empty result, describing statement for column names");
                let columns = self.describe_columns(sql).await?;
                Ok(Box::new(SqlxCursor::<PgRow>::empty(columns, convert_row)))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    decode_row(row, convert_value)
}

/// Converts a single non-null column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "BOOL" => Value::Bool(decode_column(row, index)?),
        "INT2" => Value::Int(decode_column::<_, i16>(row, index)?.into()),
        "INT4" => Value::Int(decode_column::<_, i32>(row, index)?.into()),
        "INT8" => Value::Int(decode_column(row, index)?),
        "OID" => Value::Int(decode_column::<_, Oid>(row, index)?.0.into()),
        "FLOAT4" => Value::Float(decode_column::<_, f32>(row, index)?.into()),
        "FLOAT8" => Value::Float(decode_column(row, index)?),
        // NaN and values beyond 28 digits do not fit a Decimal.
        "NUMERIC" => match decode_column::<_, Decimal>(row, index) {
            Ok(decimal) => Value::String(decimal.to_string()),
            Err(e) => {
                debug!("NUMERIC outside decimal range: {}", e);
                unsupported(type_name)
            }
        },
        "UUID" => Value::String(decode_column::<_, Uuid>(row, index)?.to_string()),
        "JSON" | "JSONB" => Value::String(decode_column::<_, JsonValue>(row, index)?.to_string()),
        "INTERVAL" => Value::String(format_interval(&decode_column(row, index)?)),
        "BYTEA" => Value::Bytes(decode_column(row, index)?),
        "DATE" => Value::String(decode_column::<_, chrono::NaiveDate>(row, index)?.to_string()),
        "TIME" => Value::String(decode_column::<_, chrono::NaiveTime>(row, index)?.to_string()),
        "TIMETZ" => {
            let time: PgTimeTz<chrono::NaiveTime, chrono::FixedOffset> = decode_column(row, index)?;
            Value::String(format!("{}{}", time.time, time.offset))
        }
        "TIMESTAMP" => Value::String(
            decode_column::<_, chrono::NaiveDateTime>(row, index)?.to_string(),
        ),
        "TIMESTAMPTZ" => Value::String(
            decode_column::<_, chrono::DateTime<chrono::Utc>>(row, index)?.to_string(),
        ),
        _ if type_name.ends_with("[]") => match array_text(row, index, type_name) {
            Ok(Some(text)) => Value::String(text),
            Ok(None) => unsupported(type_name),
            Err(e) => {
                debug!("Could not decode {} as a one-dimensional array: {}", type_name, e);
                unsupported(type_name)
            }
        },
        // Text-like types decode as String; anything else is shown by type name.
        _ => match decode_column::<_, String>(row, index) {
            Ok(text) => Value::String(text),
            Err(_) if is_enum(row, index) => Value::String(decode_column_unchecked(row, index)?),
            Err(_) => {
                debug!("No text decoding for PostgreSQL type {}", type_name);
                unsupported(type_name)
            }
        },
    };
    Ok(value)
}

/// Enum labels travel as text even in the binary protocol.
fn is_enum(row: &PgRow, index: usize) -> bool {
    row.try_get_raw(index)
        .is_ok_and(|raw| matches!(raw.type_info().kind(), PgTypeKind::Enum(_)))
}

/// Renders a one-dimensional array in PostgreSQL's `{a,b,NULL}` form, or
/// `None` for element types without a text rendering.
fn array_text(row: &PgRow, index: usize, type_name: &str) -> Result<Option<String>> {
    let element = type_name.trim_end_matches("[]");
    let text = match element {
        "BOOL" => format_array(decode_column::<_, Vec<Option<bool>>>(row, index)?, |b| {
            String::from(if b { "t" } else { "f" })
        }),
        "INT2" => format_array(decode_column::<_, Vec<Option<i16>>>(row, index)?, |n| n.to_string()),
        "INT4" => format_array(decode_column::<_, Vec<Option<i32>>>(row, index)?, |n| n.to_string()),
        "INT8" => format_array(decode_column::<_, Vec<Option<i64>>>(row, index)?, |n| n.to_string()),
        "FLOAT4" => format_array(decode_column::<_, Vec<Option<f32>>>(row, index)?, |n| n.to_string()),
        "FLOAT8" => format_array(decode_column::<_, Vec<Option<f64>>>(row, index)?, |n| n.to_string()),
        "NUMERIC" => format_array(decode_column::<_, Vec<Option<Decimal>>>(row, index)?, |n| {
            n.to_string()
        }),
        "UUID" => format_array(decode_column::<_, Vec<Option<Uuid>>>(row, index)?, |u| u.to_string()),
        "DATE" => format_array(
            decode_column::<_, Vec<Option<chrono::NaiveDate>>>(row, index)?,
            |d| d.to_string(),
        ),
        "TIMESTAMP" => format_array(
            decode_column::<_, Vec<Option<chrono::NaiveDateTime>>>(row, index)?,
            |t| quote_array_element(&t.to_string()),
        ),
        "TIMESTAMPTZ" => format_array(
            decode_column::<_, Vec<Option<chrono::DateTime<chrono::Utc>>>>(row, index)?,
            |t| quote_array_element(&t.to_string()),
        ),
        "JSON" | "JSONB" => format_array(
            decode_column::<_, Vec<Option<JsonValue>>>(row, index)?,
            |j| quote_array_element(&j.to_string()),
        ),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => format_array(
            decode_column::<_, Vec<Option<String>>>(row, index)?,
            |s| quote_array_element(&s),
        ),
        _ => return Ok(None),
    };
    Ok(Some(text))
}

fn format_array<T>(items: Vec<Option<T>>, render: impl Fn(T) -> String) -> String {
    let elements: Vec<String> = items
        .into_iter()
        .map(|item| item.map_or_else(|| "NULL".to_string(), &render))
        .collect();
    format!("{{{}}}", elements.join(","))
}

/// Quotes an array element the way PostgreSQL's array output does.
fn quote_array_element(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text
            .chars()
            .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_whitespace());
    if !needs_quotes {
        return text.to_string();
    }
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Formats an interval like PostgreSQL's default `postgres` interval style.
fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    push_unit(&mut parts, i64::from(interval.months / 12), "year");
    push_unit(&mut parts, i64::from(interval.months % 12), "mon");
    push_unit(&mut parts, i64::from(interval.days), "day");

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 {
            "-"
        } else if micros > 0 && (interval.months < 0 || interval.days < 0) {
            "+"
        } else {
            ""
        };
        let abs = micros.unsigned_abs();
        let secs = abs / 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        let fraction = abs % 1_000_000;
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

fn push_unit(parts: &mut Vec<String>, amount: i64, unit: &str) {
    if amount != 0 {
        let plural = if amount == 1 { "" } else { "s" };
        parts.push(format!("{amount} {unit}{plural}"));
    }
}

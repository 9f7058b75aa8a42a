//! Streaming cursor shared by the sqlx-backed clients.
//!
//! Wraps a sqlx row stream so rows are decoded one at a time as the caller
//! advances, instead of materializing the full result set.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use sqlx::{Column, ColumnIndex, Decode, Row as SqlxRow, Type, TypeInfo, ValueRef};

use super::{ResultCursor, Row, Value};
use crate::error::{MicroError, Result};

/// Decodes one sqlx row into our row type.
pub(crate) type RowDecoder<R> = fn(&R) -> Result<Row>;

/// Decodes one non-null column given its upper-cased type name.
pub(crate) type ValueDecoder<R> = fn(&R, usize, &str) -> Result<Value>;

/// A [`ResultCursor`] over a sqlx row stream.
///
/// The first row is fetched eagerly by the client (so the query call covers
/// the server round trip) and parked in `pending` until the caller asks for it.
pub(crate) struct SqlxCursor<'a, R> {
    stream: Option<BoxStream<'a, std::result::Result<R, sqlx::Error>>>,
    pending: Option<R>,
    columns: Vec<String>,
    decode: RowDecoder<R>,
}

impl<'a, R: SqlxRow> SqlxCursor<'a, R> {
    /// Creates a cursor from a stream whose first row was already fetched.
    pub(crate) fn new(
        stream: BoxStream<'a, std::result::Result<R, sqlx::Error>>,
        first: R,
        decode: RowDecoder<R>,
    ) -> Self {
        let columns = column_names(&first);
        Self {
            stream: Some(stream),
            pending: Some(first),
            columns,
            decode,
        }
    }

    /// Creates a cursor for a result set with no rows.
    pub(crate) fn empty(columns: Vec<String>, decode: RowDecoder<R>) -> Self {
        Self {
            stream: None,
            pending: None,
            columns,
            decode,
        }
    }
}

#[async_trait]
impl<'a, R: SqlxRow> ResultCursor for SqlxCursor<'a, R> {
    fn columns(&self) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        if let Some(row) = self.pending.take() {
            return (self.decode)(&row).map(Some);
        }

        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        match stream.try_next().await {
            Ok(Some(row)) => (self.decode)(&row).map(Some),
            Ok(None) => {
                // Release the connection as soon as the stream is exhausted.
                self.stream = None;
                Ok(None)
            }
            Err(e) => {
                self.stream = None;
                Err(MicroError::row_scan(e.to_string()))
            }
        }
    }
}

/// Returns the column names of a sqlx row.
pub(crate) fn column_names<R: SqlxRow>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Decodes every column of a row, mapping SQL NULL to [`Value::Null`] and
/// handing the rest to the backend-specific value decoder.
pub(crate) fn decode_row<R>(row: &R, decode_value: ValueDecoder<R>) -> Result<Row>
where
    R: SqlxRow,
    usize: ColumnIndex<R>,
{
    (0..row.len())
        .map(|index| {
            let raw = row
                .try_get_raw(index)
                .map_err(|e| MicroError::row_scan(e.to_string()))?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let type_name = raw.type_info().name().to_uppercase();
            decode_value(row, index, &type_name)
        })
        .collect()
}

/// Decodes a single column as `T`, reporting failures as row scan errors.
pub(crate) fn decode_column<'r, R, T>(row: &'r R, index: usize) -> Result<T>
where
    R: SqlxRow,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get(index).map_err(|e| MicroError::row_scan(e.to_string()))
}

/// Decodes a single column as `T` without checking the column type.
///
/// Used where the wire format is known to be text or raw bytes even though
/// the driver does not advertise the type as compatible (MySQL `DECIMAL`, `JSON`).
pub(crate) fn decode_column_unchecked<'r, R, T>(row: &'r R, index: usize) -> Result<T>
where
    R: SqlxRow,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database>,
{
    row.try_get_unchecked(index)
        .map_err(|e| MicroError::row_scan(e.to_string()))
}

/// Placeholder shown for column types the client cannot render.
pub(crate) fn unsupported(type_name: &str) -> Value {
    Value::String(format!("<{}>", type_name.to_lowercase()))
}

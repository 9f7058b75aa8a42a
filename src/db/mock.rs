//! Mock database client for testing.
//!
//! Serves a scripted result set from memory. Failures can be injected at the
//! query, column-fetch and row-scan steps, and open cursors are counted so
//! tests can check that every cursor is released.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{DatabaseBackend, DatabaseClient, ResultCursor, Row, Value};
use crate::error::{MicroError, Result};

/// Number of rows in the demo dataset served by [`MockDatabaseClient::new`].
const DEMO_ROW_COUNT: i64 = 25;

/// A mock database client that returns predefined results.
#[derive(Debug)]
pub struct MockDatabaseClient {
    backend: DatabaseBackend,
    columns: Vec<String>,
    rows: Vec<Row>,
    version: Option<String>,
    fail_query_on: Option<usize>,
    fail_columns: bool,
    fail_scan_at: Option<usize>,
    query_delay: Duration,
    row_delay: Duration,
    query_calls: AtomicUsize,
    open_cursors: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl MockDatabaseClient {
    /// Creates a mock client serving a small `users` table for every query.
    pub fn new() -> Self {
        let columns = ["id", "name", "email", "active", "avatar"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let rows = (1..=DEMO_ROW_COUNT)
            .map(|id| {
                vec![
                    Value::Int(id),
                    Value::String(format!("user{id}")),
                    if id % 4 == 0 {
                        Value::Null
                    } else {
                        Value::String(format!("user{id}@example.com"))
                    },
                    Value::Bool(id % 3 != 0),
                    Value::Bytes(vec![0xde, 0xad, id as u8]),
                ]
            })
            .collect();

        Self {
            version: Some("mock".to_string()),
            ..Self::with_result(columns, rows)
        }
    }

    /// Creates a mock client that returns the given result set for every query.
    pub fn with_result(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            backend: DatabaseBackend::default(),
            columns,
            rows,
            version: None,
            fail_query_on: None,
            fail_columns: false,
            fail_scan_at: None,
            query_delay: Duration::ZERO,
            row_delay: Duration::ZERO,
            query_calls: AtomicUsize::new(0),
            open_cursors: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
        }
    }

    /// Reports the given backend (affects the version probe statement).
    pub fn with_backend(mut self, backend: DatabaseBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Answers the backend's version probe with `version`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Fails the `n`-th call to `query` (1-based).
    pub fn fail_query_on(mut self, n: usize) -> Self {
        self.fail_query_on = Some(n);
        self
    }

    /// Fails every `columns` call on returned cursors.
    pub fn fail_columns(mut self) -> Self {
        self.fail_columns = true;
        self
    }

    /// Fails scanning the `n`-th row (1-based) of every cursor.
    pub fn fail_scan_at(mut self, n: usize) -> Self {
        self.fail_scan_at = Some(n);
        self
    }

    /// Makes every scripted `query` call take `delay` before returning.
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    /// Makes every scripted row take `delay` to scan.
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = delay;
        self
    }

    /// Number of `query` calls made so far.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Number of cursors handed out and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn cursor(&self, columns: Vec<String>, rows: Vec<Row>, scripted: bool) -> MockCursor {
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        MockCursor {
            columns,
            rows: rows.into_iter(),
            scanned: 0,
            fail_columns: scripted && self.fail_columns,
            fail_scan_at: if scripted { self.fail_scan_at } else { None },
            row_delay: if scripted { self.row_delay } else { Duration::ZERO },
            open: Arc::clone(&self.open_cursors),
        }
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    async fn query<'a>(&'a self, sql: &'a str) -> Result<Box<dyn ResultCursor + 'a>> {
        if self.is_closed() {
            return Err(MicroError::connection("connection is closed"));
        }

        let call = self.query_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(version) = &self.version {
            if sql.trim() == self.backend.version_sql() {
                let cursor = self.cursor(
                    vec!["version".to_string()],
                    vec![vec![Value::String(version.clone())]],
                    false,
                );
                return Ok(Box::new(cursor));
            }
        }

        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }

        if self.fail_query_on == Some(call) {
            return Err(MicroError::query(format!(
                "ERROR: mock failure on query {call}"
            )));
        }

        Ok(Box::new(self.cursor(
            self.columns.clone(),
            self.rows.clone(),
            true,
        )))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Cursor over a cloned, in-memory result set.
struct MockCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
    scanned: usize,
    fail_columns: bool,
    fail_scan_at: Option<usize>,
    row_delay: Duration,
    open: Arc<AtomicUsize>,
}

#[async_trait]
impl ResultCursor for MockCursor {
    fn columns(&self) -> Result<Vec<String>> {
        if self.fail_columns {
            return Err(MicroError::column_fetch("mock column failure"));
        }
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.rows.next() else {
            return Ok(None);
        };
        if !self.row_delay.is_zero() {
            tokio::time::sleep(self.row_delay).await;
        }
        self.scanned += 1;
        if self.fail_scan_at == Some(self.scanned) {
            return Err(MicroError::row_scan(format!(
                "mock scan failure on row {}",
                self.scanned
            )));
        }
        Ok(Some(row))
    }
}

impl Drop for MockCursor {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

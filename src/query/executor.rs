//! Repeated statement execution with separate query and render timing.
//!
//! Each call runs the statement `execution_count` times on the session
//! connection. Only the first iteration renders rows, and at most
//! `row_limit` of them, but every iteration drains its cursor completely so
//! the row counts and render timings stay comparable.

use tokio::time::Instant;
use tracing::debug;

use super::render::Transcript;
use super::report::{AggregateReport, ExecutionReport};
use crate::db::DatabaseClient;
use crate::error::{MicroError, Result};
use crate::session::SessionState;

/// Runs read statements and produces their timing transcript.
pub struct QueryExecutor<'a> {
    db: &'a dyn DatabaseClient,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new query executor borrowing the session connection.
    pub fn new(db: &'a dyn DatabaseClient) -> Self {
        Self { db }
    }

    /// Executes `sql` as many times as the session asks for.
    ///
    /// Any query, column or row failure aborts the whole call; the partial
    /// transcript is discarded with it.
    pub async fn execute(&self, sql: &str, session: &SessionState) -> Result<QueryOutcome> {
        let row_limit = session.row_limit();
        let execution_count = session.execution_count();

        let mut transcript = Transcript::new();
        let mut aggregate = AggregateReport::default();

        for iteration in 0..execution_count {
            let render = iteration == 0;
            let report = self
                .run_iteration(sql, render, row_limit, &mut transcript)
                .await
                .inspect_err(|e| {
                    debug!(
                        "Execution {} of {} failed: {}",
                        iteration + 1,
                        execution_count,
                        e
                    )
                })?;

            debug!(
                "Execution {} of {}: {} rows",
                iteration + 1,
                execution_count,
                report.row_count
            );
            transcript.summary(&report);
            aggregate.record(&report);
        }

        if execution_count > 1 {
            transcript.average(&aggregate);
        }
        transcript.finish();

        Ok(QueryOutcome {
            aggregate,
            transcript: transcript.into_string(),
        })
    }

    /// One execution: issue the query, then drain the cursor.
    async fn run_iteration(
        &self,
        sql: &str,
        render: bool,
        row_limit: usize,
        transcript: &mut Transcript,
    ) -> Result<ExecutionReport> {
        let query_start = Instant::now();
        let mut cursor = self.db.query(sql).await?;
        let query_latency = query_start.elapsed();

        let render_start = Instant::now();
        let columns = cursor.columns()?;
        if render {
            transcript.header(&columns);
        }

        let mut row_count = 0;
        while let Some(row) = cursor.next_row().await? {
            if row.len() != columns.len() {
                return Err(MicroError::row_scan(format!(
                    "row has {} values but the result has {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            if render {
                if row_count < row_limit {
                    transcript.row(&row);
                } else if row_count == row_limit {
                    transcript.truncated(row_limit);
                }
            }
            row_count += 1;
        }
        drop(cursor);
        let render_latency = render_start.elapsed();

        Ok(ExecutionReport {
            row_count,
            query_latency,
            render_latency,
        })
    }
}

/// Successful executor call.
#[derive(Debug)]
pub struct QueryOutcome {
    /// Totals over all executions.
    pub aggregate: AggregateReport,
    /// Rendered output: header, rows, per-execution lines, average and the
    /// closing separator.
    pub transcript: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MockDatabaseClient, Row, Value};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn numbers(count: i64) -> MockDatabaseClient {
        let rows: Vec<Row> = (1..=count)
            .map(|n| vec![Value::Int(n), Value::String(format!("row{n}"))])
            .collect();
        MockDatabaseClient::with_result(vec!["id".to_string(), "label".to_string()], rows)
    }

    fn session(row_limit: usize, execution_count: usize) -> SessionState {
        SessionState::new(row_limit, execution_count).unwrap()
    }

    fn summary_lines(transcript: &str) -> Vec<&str> {
        transcript
            .lines()
            .filter(|l| l.ends_with("ms result)"))
            .collect()
    }

    fn count_marker(transcript: &str) -> usize {
        transcript.matches("[...] Output truncated").count()
    }

    #[tokio::test]
    async fn test_truncates_at_row_limit() {
        let db = numbers(5);
        let outcome = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(2, 1))
            .await
            .unwrap();

        let lines: Vec<&str> = outcome.transcript.lines().collect();
        let dashes = "-".repeat(60);
        assert_eq!(lines[0], dashes);
        assert_eq!(lines[1], "id\tlabel");
        assert_eq!(lines[2], dashes);
        assert_eq!(lines[3], "1\trow1");
        assert_eq!(lines[4], "2\trow2");
        assert_eq!(lines[5], "[...] Output truncated at 2 rows.");
        assert!(lines[6].starts_with("5 rows ("));
        assert_eq!(lines[7], dashes);
        assert_eq!(lines.len(), 8);
        assert_eq!(outcome.aggregate.total_rows(), 5);
    }

    #[tokio::test]
    async fn test_no_marker_when_rows_fit() {
        for rows in [0, 1, 3] {
            let db = numbers(rows);
            let outcome = QueryExecutor::new(&db)
                .execute("SELECT * FROM t", &session(3, 1))
                .await
                .unwrap();
            assert_eq!(count_marker(&outcome.transcript), 0, "rows = {rows}");
            assert!(outcome.transcript.contains(&format!("{rows} rows (")));
        }
    }

    #[tokio::test]
    async fn test_marker_once_across_iterations() {
        let db = numbers(4);
        let outcome = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(3, 4))
            .await
            .unwrap();
        assert_eq!(count_marker(&outcome.transcript), 1);
        assert_eq!(outcome.transcript.matches("4\trow4").count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_executions_report_average() {
        let db = numbers(3);
        let outcome = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(10, 3))
            .await
            .unwrap();

        let summaries = summary_lines(&outcome.transcript);
        assert_eq!(summaries.len(), 4);
        assert!(summaries[..3].iter().all(|l| l.starts_with("3 rows (")));
        assert!(summaries[3].starts_with("Average: 3 rows ("));
        assert!(summaries[3].ends_with("3 executions)"));
        assert_eq!(db.query_calls(), 3);
        assert_eq!(outcome.aggregate.executions(), 3);
    }

    #[tokio::test]
    async fn test_single_execution_has_no_average() {
        let db = numbers(3);
        let outcome = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(10, 1))
            .await
            .unwrap();
        assert!(!outcome.transcript.contains("Average:"));
        assert_eq!(summary_lines(&outcome.transcript).len(), 1);
    }

    #[tokio::test]
    async fn test_header_rendered_once_per_call() {
        let db = numbers(2);
        let outcome = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(10, 5))
            .await
            .unwrap();
        assert_eq!(outcome.transcript.matches("id\tlabel\n").count(), 1);
        assert_eq!(outcome.transcript.matches("1\trow1\n").count(), 1);
        // Header pair plus the closing separator.
        assert_eq!(outcome.transcript.matches(&"-".repeat(60)).count(), 3);
    }

    #[tokio::test]
    async fn test_row_count_is_stable_across_calls() {
        let db = numbers(7);
        let executor = QueryExecutor::new(&db);
        let state = session(2, 1);
        let first = executor.execute("SELECT * FROM t", &state).await.unwrap();
        let second = executor.execute("SELECT * FROM t", &state).await.unwrap();
        assert_eq!(first.aggregate.total_rows(), 7);
        assert_eq!(second.aggregate.total_rows(), 7);
    }

    #[tokio::test]
    async fn test_empty_result_prints_header() {
        let db = numbers(0);
        let outcome = QueryExecutor::new(&db)
            .execute("SELECT * FROM t WHERE false", &session(10, 1))
            .await
            .unwrap();
        assert!(outcome.transcript.contains("id\tlabel\n"));
        assert!(outcome.transcript.contains("0 rows ("));
    }

    #[tokio::test]
    async fn test_failure_mid_run_aborts_call() {
        let db = numbers(3).fail_query_on(2);
        let result = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(10, 3))
            .await;

        assert!(matches!(result, Err(MicroError::Query(_))));
        assert_eq!(db.query_calls(), 2);
        assert_eq!(db.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_column_failure_is_reported() {
        let db = numbers(3).fail_columns();
        let result = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(10, 1))
            .await;
        assert!(matches!(result, Err(MicroError::ColumnFetch(_))));
        assert_eq!(db.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_scan_failure_beyond_limit_is_reported() {
        // Rows past the display limit are still read and decoded.
        let db = numbers(5).fail_scan_at(4);
        let result = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(2, 1))
            .await;
        assert!(matches!(result, Err(MicroError::RowScan(_))));
        assert_eq!(db.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_misaligned_row_is_a_scan_error() {
        let db = MockDatabaseClient::with_result(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Value::Int(1)]],
        );
        let result = QueryExecutor::new(&db)
            .execute("SELECT a, b FROM t", &session(10, 1))
            .await;
        assert!(matches!(result, Err(MicroError::RowScan(_))));
    }

    #[tokio::test]
    async fn test_binary_values_render_as_text() {
        let db = MockDatabaseClient::with_result(
            vec!["payload".to_string(), "blob".to_string(), "missing".to_string()],
            vec![vec![
                Value::Bytes(b"hello".to_vec()),
                Value::Bytes(vec![0xde, 0xad]),
                Value::Null,
            ]],
        );
        let outcome = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(10, 1))
            .await
            .unwrap();
        assert!(outcome.transcript.contains("hello\t\\xdead\tNULL\n"));
    }

    #[tokio::test]
    async fn test_cursors_released_after_success() {
        let db = numbers(20);
        QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(1, 3))
            .await
            .unwrap();
        assert_eq!(db.open_cursors(), 0);
    }

    // Paused clock: only the mock's sleeps move time forward.
    #[tokio::test(start_paused = true)]
    async fn test_slow_query_only_raises_query_latency() {
        let db = numbers(5).with_query_delay(Duration::from_millis(40));

        let single = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(10, 1))
            .await
            .unwrap()
            .aggregate;
        assert!(single.query_total() >= Duration::from_millis(40));
        assert!(single.query_total() < Duration::from_millis(45));
        assert!(single.render_total() < Duration::from_millis(1));

        let repeated = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(10, 3))
            .await
            .unwrap()
            .aggregate;
        assert!(repeated.average_query_latency() >= Duration::from_millis(40));
        assert!(repeated.average_query_latency() < Duration::from_millis(45));
        assert!(repeated.average_render_latency() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_drain_only_raises_render_latency() {
        // Rows past the limit are not rendered but still cost their scan time.
        let db = numbers(5).with_row_delay(Duration::from_millis(10));

        let single = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(2, 1))
            .await
            .unwrap()
            .aggregate;
        assert!(single.render_total() >= Duration::from_millis(50));
        assert!(single.render_total() < Duration::from_millis(60));
        assert!(single.query_total() < Duration::from_millis(1));

        let repeated = QueryExecutor::new(&db)
            .execute("SELECT * FROM t", &session(2, 4))
            .await
            .unwrap()
            .aggregate;
        assert!(repeated.average_render_latency() >= Duration::from_millis(50));
        assert!(repeated.average_render_latency() < Duration::from_millis(60));
        assert!(repeated.average_query_latency() < Duration::from_millis(1));
    }
}

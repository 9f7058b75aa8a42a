//! Per-iteration and aggregate timing reports.

use std::fmt;
use std::time::Duration;

/// Converts a duration to fractional milliseconds.
pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Timing and row count of one execution of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Rows read from the cursor (all of them, not just the rendered ones).
    pub row_count: usize,
    /// Time spent in the driver's `query` call.
    pub query_latency: Duration,
    /// Time spent draining, rendering and releasing the cursor.
    pub render_latency: Duration,
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows ({:.3} ms query, {:.3} ms result)",
            self.row_count,
            millis(self.query_latency),
            millis(self.render_latency)
        )
    }
}

/// Running totals over the executions of one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateReport {
    total_rows: usize,
    query_total: Duration,
    render_total: Duration,
    executions: usize,
}

impl AggregateReport {
    /// Adds one execution. The row count is replaced, not summed.
    pub fn record(&mut self, report: &ExecutionReport) {
        self.total_rows = report.row_count;
        self.query_total += report.query_latency;
        self.render_total += report.render_latency;
        self.executions += 1;
    }

    /// Row count of the most recent execution.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Number of executions recorded.
    pub fn executions(&self) -> usize {
        self.executions
    }

    /// Sum of query latencies.
    pub fn query_total(&self) -> Duration {
        self.query_total
    }

    /// Sum of render latencies.
    pub fn render_total(&self) -> Duration {
        self.render_total
    }

    /// Mean query latency, zero when nothing was recorded.
    pub fn average_query_latency(&self) -> Duration {
        average(self.query_total, self.executions)
    }

    /// Mean render latency, zero when nothing was recorded.
    pub fn average_render_latency(&self) -> Duration {
        average(self.render_total, self.executions)
    }
}

fn average(total: Duration, count: usize) -> Duration {
    if count == 0 {
        Duration::ZERO
    } else {
        total.div_f64(count as f64)
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Average: {} rows ({:.3} ms query, {:.3} ms result, {} executions)",
            self.total_rows,
            millis(self.average_query_latency()),
            millis(self.average_render_latency()),
            self.executions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report(rows: usize, query_us: u64, render_us: u64) -> ExecutionReport {
        ExecutionReport {
            row_count: rows,
            query_latency: Duration::from_micros(query_us),
            render_latency: Duration::from_micros(render_us),
        }
    }

    #[test]
    fn test_execution_report_format() {
        assert_eq!(
            report(5, 1_250, 42).to_string(),
            "5 rows (1.250 ms query, 0.042 ms result)"
        );
    }

    #[test]
    fn test_aggregate_averages() {
        let mut aggregate = AggregateReport::default();
        aggregate.record(&report(3, 1_000, 200));
        aggregate.record(&report(3, 2_000, 400));
        aggregate.record(&report(3, 3_000, 600));

        assert_eq!(aggregate.executions(), 3);
        assert_eq!(aggregate.total_rows(), 3);
        assert_eq!(aggregate.query_total(), Duration::from_micros(6_000));
        assert_eq!(aggregate.average_query_latency(), Duration::from_micros(2_000));
        assert_eq!(
            aggregate.to_string(),
            "Average: 3 rows (2.000 ms query, 0.400 ms result, 3 executions)"
        );
    }

    #[test]
    fn test_aggregate_keeps_last_row_count() {
        let mut aggregate = AggregateReport::default();
        aggregate.record(&report(10, 1, 1));
        aggregate.record(&report(7, 1, 1));
        assert_eq!(aggregate.total_rows(), 7);
    }

    #[test]
    fn test_empty_aggregate_is_zero() {
        let aggregate = AggregateReport::default();
        assert_eq!(aggregate.average_query_latency(), Duration::ZERO);
        assert_eq!(aggregate.average_render_latency(), Duration::ZERO);
    }
}

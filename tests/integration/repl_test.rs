//! Command-loop tests over the mock client.

use std::collections::VecDeque;
use std::sync::Arc;

use micro_sql::config::ConnectionConfig;
use micro_sql::connection::ConnectionManager;
use micro_sql::db::{DatabaseClient, MockDatabaseClient};
use micro_sql::error::Result;
use micro_sql::repl::{LineSource, ReadOutcome, Repl};
use micro_sql::session::SessionState;

struct Script(VecDeque<String>);

impl Script {
    fn new(lines: &[&str]) -> Self {
        Self(lines.iter().map(|l| l.to_string()).collect())
    }
}

impl LineSource for Script {
    fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome> {
        Ok(self
            .0
            .pop_front()
            .map(ReadOutcome::Line)
            .unwrap_or(ReadOutcome::Eof))
    }
}

async fn run_script(db: &dyn DatabaseClient, lines: &[&str]) -> String {
    let mut repl = Repl::new(db, SessionState::default());
    let mut out = Vec::new();
    repl.run(&mut Script::new(lines), &mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn test_session_settings_apply_to_later_queries() {
    let db = MockDatabaseClient::new();
    let out = run_script(
        &db,
        &[
            "SET MICRO LIMIT=3",
            "SET MICRO COUNT = 2",
            "SELECT * FROM users",
            "exit",
        ],
    )
    .await;

    assert!(out.contains("Row limit set to 3\n"));
    assert!(out.contains("Execution count set to 2\n"));
    assert!(out.contains("[...] Output truncated at 3 rows.\n"));
    assert_eq!(out.matches("25 rows (").count(), 3);
    assert!(out.contains("2 executions)"));
    assert!(out.ends_with("End of line.\n"));
    assert_eq!(db.query_calls(), 2);
    assert_eq!(db.open_cursors(), 0);
}

#[tokio::test]
async fn test_rejected_and_failed_statements_do_not_end_the_loop() {
    let db = MockDatabaseClient::new().fail_scan_at(20);
    let out = run_script(
        &db,
        &[
            "DROP TABLE users",
            "SET MICRO LIMIT=0",
            "SELECT * FROM users",
            "HELP",
        ],
    )
    .await;

    assert!(out.contains("Only SELECT and SHOW statements are allowed."));
    assert!(out.contains("Invalid value. Must be a positive integer.\n"));
    assert!(out.contains("Row scan error: "));
    assert!(out.contains("(Currently 10)"));
    assert!(out.ends_with("End of line.\n"));
    assert_eq!(db.open_cursors(), 0);
}

#[tokio::test]
async fn test_attached_mock_closes_with_manager() {
    let db = Arc::new(MockDatabaseClient::new());
    let mut manager = ConnectionManager::new();
    let config = ConnectionConfig {
        database: Some("mock".to_string()),
        ..Default::default()
    };

    manager.attach(db.clone(), config).await.unwrap();
    assert_eq!(
        manager.banner().unwrap(),
        "Connected to postgresql database 'mock' (server mock)!"
    );

    let shared = manager.shared().unwrap();
    let out = run_script(shared.as_ref(), &["SELECT id FROM users"]).await;
    assert!(out.contains("25 rows ("));

    manager.close().await.unwrap();
    assert!(db.is_closed());
}

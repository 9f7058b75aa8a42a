//! Executor tests against a real SQLite database file.

use std::path::Path;

use micro_sql::config::ConnectionConfig;
use micro_sql::db::{DatabaseBackend, DatabaseClient, SqliteClient};
use micro_sql::error::MicroError;
use micro_sql::query::QueryExecutor;
use micro_sql::safety::ReadOnlyGuard;
use micro_sql::session::SessionState;
use pretty_assertions::assert_eq;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

/// Creates `numbers(n, label)` with `count` rows using a writable pool.
async fn seed_database(path: &Path, count: i64) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query("CREATE TABLE numbers (n INTEGER NOT NULL, label TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    for n in 1..=count {
        sqlx::query("INSERT INTO numbers (n, label) VALUES (?, ?)")
            .bind(n)
            .bind(format!("row {n}"))
            .execute(&pool)
            .await
            .unwrap();
    }
    sqlx::query("INSERT INTO numbers (n, label) VALUES (0, NULL)")
        .execute(&pool)
        .await
        .unwrap();

    pool.close().await;
}

async fn open_client(dir: &TempDir, rows: i64) -> SqliteClient {
    let path = dir.path().join("micro.db");
    seed_database(&path, rows).await;

    let config = ConnectionConfig {
        backend: DatabaseBackend::Sqlite,
        database: Some(path.to_string_lossy().into_owned()),
        ..Default::default()
    };
    SqliteClient::connect(&config).await.unwrap()
}

#[tokio::test]
async fn test_truncates_first_iteration_and_counts_every_row() {
    let dir = TempDir::new().unwrap();
    let client = open_client(&dir, 15).await;

    let session = SessionState::new(5, 3).unwrap();
    let outcome = QueryExecutor::new(&client)
        .execute("SELECT n, label FROM numbers WHERE n > 0 ORDER BY n", &session)
        .await
        .unwrap();

    let out = &outcome.transcript;
    assert!(out.contains("n\tlabel\n"));
    assert!(out.contains("5\trow 5\n"));
    assert!(!out.contains("6\trow 6\n"));
    assert!(out.contains("[...] Output truncated at 5 rows.\n"));
    assert_eq!(out.matches("15 rows (").count(), 3);
    assert!(out.contains("Average: 15 rows ("));
    assert!(out.contains("3 executions)"));
    assert_eq!(outcome.aggregate.executions(), 3);
    assert_eq!(outcome.aggregate.total_rows(), 15);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_result_prints_header() {
    let dir = TempDir::new().unwrap();
    let client = open_client(&dir, 3).await;

    let outcome = QueryExecutor::new(&client)
        .execute("SELECT n, label FROM numbers WHERE n > 100", &SessionState::default())
        .await
        .unwrap();

    assert!(outcome.transcript.contains("n\tlabel\n"));
    assert!(outcome.transcript.contains("0 rows ("));
    assert!(!outcome.transcript.contains("Average:"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_null_renders_as_null() {
    let dir = TempDir::new().unwrap();
    let client = open_client(&dir, 1).await;

    let outcome = QueryExecutor::new(&client)
        .execute("SELECT n, label FROM numbers WHERE n = 0", &SessionState::default())
        .await
        .unwrap();

    assert!(outcome.transcript.contains("0\tNULL\n"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_connection_is_read_only() {
    let dir = TempDir::new().unwrap();
    let client = open_client(&dir, 1).await;

    // Bypass the guard: the connection itself must refuse writes.
    let err = QueryExecutor::new(&client)
        .execute("DELETE FROM numbers", &SessionState::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MicroError::Query(_)), "got {err:?}");

    let guard = ReadOnlyGuard::new(client.backend());
    assert!(guard.check("DELETE FROM numbers").is_err());
    assert!(guard.check("SELECT n FROM numbers").is_ok());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_table_is_query_error() {
    let dir = TempDir::new().unwrap();
    let client = open_client(&dir, 1).await;

    let err = QueryExecutor::new(&client)
        .execute("SELECT * FROM missing", &SessionState::default())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Query error: "));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_version_probe() {
    let dir = TempDir::new().unwrap();
    let client = open_client(&dir, 1).await;

    let version = client.server_version().await.unwrap();
    assert!(version.starts_with('3'), "unexpected version {version}");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_file_is_connection_error() {
    let dir = TempDir::new().unwrap();
    let config = ConnectionConfig {
        backend: DatabaseBackend::Sqlite,
        database: Some(dir.path().join("absent.db").to_string_lossy().into_owned()),
        ..Default::default()
    };

    assert!(SqliteClient::connect(&config).await.is_err());
}

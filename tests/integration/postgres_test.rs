//! PostgreSQL integration tests.
//!
//! Skipped unless DATABASE_URL points at a running server.

use micro_sql::config::ConnectionConfig;
use micro_sql::connection::ConnectionManager;
use micro_sql::db::{DatabaseClient, PostgresClient};
use micro_sql::query::QueryExecutor;
use micro_sql::session::SessionState;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test client.
async fn get_test_client() -> Option<PostgresClient> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    PostgresClient::connect(&config).await.ok()
}

#[tokio::test]
async fn test_generate_series_is_truncated() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let session = SessionState::new(10, 2).unwrap();
    let outcome = QueryExecutor::new(&client)
        .execute("SELECT g AS n FROM generate_series(1, 250) AS g", &session)
        .await
        .unwrap();

    let out = &outcome.transcript;
    assert!(out.contains("\n10\n"));
    assert!(!out.contains("\n11\n"));
    assert!(out.contains("[...] Output truncated at 10 rows.\n"));
    assert_eq!(out.matches("250 rows (").count(), 3);
    assert_eq!(outcome.aggregate.executions(), 2);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_types_render_as_text() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let outcome = QueryExecutor::new(&client)
        .execute(
            "SELECT 1::int4 AS i, 'hi'::text AS t, true AS b, NULL::text AS missing",
            &SessionState::default(),
        )
        .await
        .unwrap();

    assert!(outcome.transcript.contains("i\tt\tb\tmissing\n"));
    assert!(outcome.transcript.contains("1\thi\ttrue\tNULL\n"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_manager_banner_reports_server_version() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let config = ConnectionConfig::from_connection_string(&url).unwrap();

    let mut manager = ConnectionManager::new();
    manager.connect(config).await.unwrap();

    let banner = manager.banner().unwrap();
    assert!(banner.starts_with("Connected to postgresql database '"));
    assert!(banner.ends_with(")!"));

    manager.close().await.unwrap();
    assert!(manager.shared().is_none());
}

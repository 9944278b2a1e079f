//! SQLite integration tests.
//!
//! Run against in-memory databases and temporary files, so they need no
//! external services.

use db_pager::connection::DriverKind;
use db_pager::db::{self, Driver, Value};
use db_pager::error::PagerError;
use db_pager::query::{Paginator, Query};

/// Builds a connection string for a file in `dir`. The path is absolute, so
/// the string reads `sqlite:////tmp/...`.
fn file_url(dir: &tempfile::TempDir, name: &str) -> String {
    format!("sqlite:///{}", dir.path().join(name).display())
}

async fn run(driver: &dyn Driver, sql: &str) -> Vec<Vec<Value>> {
    let mut query = Query::new(driver, sql).unwrap();
    query.execute().await;
    let rows = query.fetch(100).await;
    query.close().await;
    rows
}

#[tokio::test]
async fn test_open_in_memory() {
    let mut driver = db::open("sqlite://:memory:").await.unwrap();

    assert_eq!(driver.kind(), DriverKind::Sqlite);
    assert_eq!(driver.url(), "sqlite://:memory:");
    assert_eq!(run(driver.as_ref(), "SELECT 1 + 1").await, vec![vec![Value::Int(2)]]);

    driver.close().await;
    // Closing twice is harmless.
    driver.close().await;
}

#[tokio::test]
async fn test_empty_connection_string_is_memory() {
    let mut driver = db::open("").await.unwrap();
    assert_eq!(driver.url(), "sqlite://:memory:");
    driver.close().await;
}

#[tokio::test]
async fn test_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let url = file_url(&dir, "pager.db");

    let mut driver = db::open(&url).await.unwrap();
    for sql in [
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)",
        "INSERT INTO notes (body) VALUES ('first'), ('second')",
    ] {
        assert_eq!(run(driver.as_ref(), sql).await, vec![vec![Value::from("ok")]]);
    }
    driver.close().await;

    let mut driver = db::open(&url).await.unwrap();
    let rows = run(driver.as_ref(), "SELECT body FROM notes ORDER BY id").await;
    assert_eq!(
        rows,
        vec![vec![Value::from("first")], vec![Value::from("second")]]
    );
    driver.close().await;
}

#[tokio::test]
async fn test_rejected_file_names() {
    let result = db::open("sqlite://no spaces.db").await;
    assert!(matches!(result, Err(PagerError::InvalidDatabaseName(_))));

    let result = db::open("sqlite://notes.txt").await;
    assert!(matches!(result, Err(PagerError::InvalidExtension(_))));

    let result = db::open("oracle://db.example.com/app").await;
    assert!(matches!(result, Err(PagerError::UnsupportedDriver(scheme)) if scheme == "oracle"));
}

#[tokio::test]
async fn test_error_is_reported_as_data() {
    let mut driver = db::open("sqlite://:memory:").await.unwrap();

    let mut query = Query::new(driver.as_ref(), "SELECT * FROM missing_table").unwrap();
    query.execute().await;

    assert_eq!(query.keys(), vec!["error"]);
    let message = query.error().unwrap().to_string();
    assert!(message.contains("missing_table"), "unexpected error: {message}");

    let rows = query.fetch(10).await;
    assert_eq!(rows, vec![vec![Value::String(message.clone())]]);
    // The error row stays put on later fetches.
    assert_eq!(query.fetch(10).await, rows);
    query.close().await;

    // The connection survives the failed statement.
    assert_eq!(run(driver.as_ref(), "SELECT 7").await, vec![vec![Value::Int(7)]]);
    driver.close().await;
}

#[tokio::test]
async fn test_failed_command_rolls_back() {
    let mut driver = db::open("sqlite://:memory:").await.unwrap();
    run(driver.as_ref(), "CREATE TABLE t (n INTEGER NOT NULL)").await;

    let rows = run(driver.as_ref(), "INSERT INTO t VALUES (1), (NULL)").await;
    assert_eq!(rows.len(), 1);
    assert!(matches!(&rows[0][0], Value::String(msg) if msg.contains("NOT NULL")));

    let count = run(driver.as_ref(), "SELECT COUNT(*) FROM t").await;
    assert_eq!(count, vec![vec![Value::Int(0)]]);
    driver.close().await;
}

#[tokio::test]
async fn test_command_acknowledged_once() {
    let mut driver = db::open("sqlite://:memory:").await.unwrap();

    let mut query = Query::new(driver.as_ref(), "CREATE TABLE t (n INTEGER)").unwrap();
    query.execute().await;
    assert_eq!(query.fetch(10).await, vec![vec![Value::from("ok")]]);
    assert!(query.fetch(10).await.is_empty());
    query.close().await;

    driver.close().await;
}

#[tokio::test]
async fn test_returning_is_tabular() {
    let mut driver = db::open("sqlite://:memory:").await.unwrap();
    run(driver.as_ref(), "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").await;

    let mut query =
        Query::new(driver.as_ref(), "INSERT INTO t (name) VALUES ('a'), ('b') RETURNING id").unwrap();
    query.execute().await;
    assert_eq!(query.keys(), vec!["id"]);
    assert_eq!(
        query.fetch(10).await,
        vec![vec![Value::Int(1)], vec![Value::Int(2)]]
    );
    query.close().await;

    driver.close().await;
}

#[tokio::test]
async fn test_only_first_statement_runs() {
    let mut driver = db::open("sqlite://:memory:").await.unwrap();
    run(driver.as_ref(), "CREATE TABLE t (n INTEGER)").await;

    let mut query = Query::new(
        driver.as_ref(),
        "INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
    )
    .unwrap();
    assert_eq!(query.statement().ignored_statements(), 1);
    query.execute().await;
    query.close().await;

    let rows = run(driver.as_ref(), "SELECT n FROM t").await;
    assert_eq!(rows, vec![vec![Value::Int(1)]]);
    driver.close().await;
}

#[tokio::test]
async fn test_paginator_over_table() {
    let mut driver = db::open("sqlite://:memory:").await.unwrap();
    run(driver.as_ref(), "CREATE TABLE t (n INTEGER)").await;
    run(
        driver.as_ref(),
        "INSERT INTO t SELECT value FROM (WITH RECURSIVE s(value) AS (SELECT 1 UNION ALL SELECT value + 1 FROM s WHERE value < 25) SELECT value FROM s)",
    )
    .await;

    let mut query = Query::new(driver.as_ref(), "SELECT n FROM t ORDER BY n").unwrap();
    query.execute().await;
    let mut pager = Paginator::with_page_size(query, 10);

    assert_eq!(pager.next_page().await.rows.len(), 10);
    assert_eq!(pager.next_page().await.rows.len(), 10);
    let third = pager.next_page().await;
    assert_eq!(third.rows.len(), 5);
    assert_eq!(third.rows[0], vec![Value::Int(21)]);

    let back = pager.prev_page().await.unwrap();
    assert_eq!(back.number, 2);
    assert_eq!(back.rows[0], vec![Value::Int(11)]);

    pager.close().await;
    driver.close().await;
}

#[tokio::test]
async fn test_not_connected_after_close() {
    let mut driver = db::open("sqlite://:memory:").await.unwrap();
    driver.close().await;

    let mut query = Query::new(driver.as_ref(), "SELECT 1").unwrap();
    query.execute().await;
    assert_eq!(query.error(), Some("Not connected"));
}

#[tokio::test]
async fn test_statements_refused_inside_transactions() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = db::open(&file_url(&dir, "settings.db")).await.unwrap();
    run(driver.as_ref(), "CREATE TABLE t (n INTEGER)").await;

    assert_eq!(run(driver.as_ref(), "VACUUM").await, vec![vec![Value::from("ok")]]);

    let mut query = Query::new(driver.as_ref(), "PRAGMA journal_mode = WAL").unwrap();
    query.execute().await;
    assert_eq!(query.error(), None);
    assert_eq!(query.keys(), vec!["journal_mode"]);
    assert_eq!(query.fetch(10).await, vec![vec![Value::from("wal")]]);
    query.close().await;

    assert_eq!(
        run(driver.as_ref(), "PRAGMA foreign_keys = ON").await,
        vec![vec![Value::from("ok")]]
    );
    assert_eq!(
        run(driver.as_ref(), "PRAGMA foreign_keys").await,
        vec![vec![Value::Int(1)]]
    );
    assert_eq!(
        run(driver.as_ref(), "PRAGMA foreign_keys = OFF").await,
        vec![vec![Value::from("ok")]]
    );
    assert_eq!(
        run(driver.as_ref(), "PRAGMA foreign_keys").await,
        vec![vec![Value::Int(0)]]
    );

    driver.close().await;
}

#[tokio::test]
async fn test_setting_pragma_acknowledged_once() {
    let mut driver = db::open("sqlite://:memory:").await.unwrap();

    let mut query = Query::new(driver.as_ref(), "PRAGMA user_version = 3").unwrap();
    query.execute().await;
    assert_eq!(query.keys(), vec!["result"]);
    assert_eq!(query.fetch(10).await, vec![vec![Value::from("ok")]]);
    assert!(query.fetch(10).await.is_empty());
    query.close().await;

    assert_eq!(
        run(driver.as_ref(), "PRAGMA user_version").await,
        vec![vec![Value::Int(3)]]
    );
    driver.close().await;
}

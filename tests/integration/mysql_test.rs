//! MySQL integration tests.
//!
//! These tests require a running MySQL database.
//! Set MYSQL_URL environment variable to run them.

use db_pager::connection::DriverKind;
use db_pager::db::{self, Driver, Value};
use db_pager::query::{Paginator, Query};

/// Helper to connect to the test database, if one is configured.
async fn get_test_driver() -> Option<Box<dyn Driver>> {
    let url = std::env::var("MYSQL_URL").ok()?;
    db::open(&url).await.ok()
}

#[tokio::test]
async fn test_connect_and_url() {
    let Some(mut driver) = get_test_driver().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };

    assert_eq!(driver.kind(), DriverKind::MySql);
    assert!(driver.url().starts_with("mysql://"));
    assert!(!driver.url().contains('@'));
    driver.close().await;
}

#[tokio::test]
async fn test_value_conversion() {
    let Some(mut driver) = get_test_driver().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };

    let mut query = Query::new(
        driver.as_ref(),
        "SELECT CAST(7 AS SIGNED) AS n, 'text' AS label, CAST(1.25 AS DECIMAL(5,2)) AS price, NULL AS missing",
    )
    .unwrap();
    query.execute().await;

    assert_eq!(query.keys(), vec!["n", "label", "price", "missing"]);
    assert_eq!(
        query.fetch(10).await,
        vec![vec![
            Value::Int(7),
            Value::from("text"),
            Value::from("1.25"),
            Value::Null,
        ]]
    );

    query.close().await;
    driver.close().await;
}

#[tokio::test]
async fn test_error_then_usable() {
    let Some(mut driver) = get_test_driver().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };

    let mut query = Query::new(driver.as_ref(), "SELECT * FROM table_that_does_not_exist").unwrap();
    query.execute().await;
    assert_eq!(query.keys(), vec!["error"]);
    query.close().await;

    let mut query = Query::new(driver.as_ref(), "SELECT CAST(3 AS SIGNED)").unwrap();
    query.execute().await;
    assert_eq!(query.fetch(1).await, vec![vec![Value::Int(3)]]);
    query.close().await;

    driver.close().await;
}

#[tokio::test]
async fn test_paging_recursive_cte() {
    let Some(mut driver) = get_test_driver().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };

    let mut query = Query::new(
        driver.as_ref(),
        "WITH RECURSIVE s (n) AS (SELECT CAST(1 AS SIGNED) UNION ALL SELECT n + 1 FROM s WHERE n < 25) SELECT n FROM s",
    )
    .unwrap();
    query.execute().await;
    let mut pager = Paginator::with_page_size(query, 10);

    assert_eq!(pager.next_page().await.rows.len(), 10);
    assert_eq!(pager.next_page().await.rows[0], vec![Value::Int(11)]);
    assert_eq!(pager.next_page().await.rows.len(), 5);

    pager.close().await;
    driver.close().await;
}

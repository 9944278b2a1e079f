//! Pagination integration tests against real SQLite result sets.

use db_pager::db::{self, Driver, Value};
use db_pager::error::PagerError;
use db_pager::query::{Paginator, Query, MAX_ROWS, PAGE_SIZE};
use tokio_util::sync::CancellationToken;

/// A statement producing the integers `1..=count` in order.
fn series(count: usize) -> String {
    format!(
        "WITH RECURSIVE s(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM s WHERE n < {count}) SELECT n FROM s"
    )
}

async fn memory() -> Box<dyn Driver> {
    db::open("sqlite://:memory:").await.unwrap()
}

#[tokio::test]
async fn test_two_full_pages_then_empty() {
    let mut driver = memory().await;
    let query = Query::new(driver.as_ref(), &series(2 * PAGE_SIZE)).unwrap();
    let mut pager = query.paginate().await;
    assert_eq!(pager.keys(), vec!["n"]);

    let first = pager.next_page().await.clone();
    assert_eq!(first.number, 1);
    assert_eq!(first.rows.len(), PAGE_SIZE);
    assert_eq!(first.rows[0], vec![Value::Int(1)]);
    assert!(pager.has_next());
    assert!(!pager.has_prev());

    let second = pager.next_page().await.clone();
    assert_eq!(second.rows.len(), PAGE_SIZE);
    assert_eq!(second.rows[0], vec![Value::Int(PAGE_SIZE as i64 + 1)]);
    assert!(pager.has_prev());

    let third = pager.next_page().await;
    assert_eq!(third.number, 3);
    assert!(third.rows.is_empty());

    pager.close().await;
    driver.close().await;
}

#[tokio::test]
async fn test_prev_page_matches_forward_page() {
    let mut driver = memory().await;
    let mut query = Query::new(driver.as_ref(), &series(95)).unwrap();
    query.execute().await;
    let mut pager = Paginator::with_page_size(query, 20);

    let mut forward = Vec::new();
    for _ in 0..4 {
        forward.push(pager.next_page().await.clone());
    }
    assert_eq!(pager.page(), 4);

    let back = pager.prev_page().await.unwrap().clone();
    assert_eq!(back, forward[2]);
    let back = pager.prev_page().await.unwrap().clone();
    assert_eq!(back.rows, forward[1].rows);
    assert_eq!(back.rows[0], vec![Value::Int(21)]);

    let last = pager.next_page().await.clone();
    assert_eq!(last.rows, forward[2].rows);
    let tail = pager.next_page().await;
    assert_eq!(tail.rows, forward[3].rows);
    let tail = pager.next_page().await;
    assert_eq!(tail.rows.len(), 15);
    assert_eq!(tail.rows[14], vec![Value::Int(95)]);

    pager.close().await;
    driver.close().await;
}

#[tokio::test]
async fn test_prev_page_refused_for_delete() {
    let mut driver = memory().await;
    let mut setup = Query::new(
        driver.as_ref(),
        &format!("CREATE TABLE t AS {}", series(30)),
    )
    .unwrap();
    setup.execute().await;
    setup.close().await;

    let mut query = Query::new(driver.as_ref(), "DELETE FROM t RETURNING n").unwrap();
    query.execute().await;
    let mut pager = Paginator::with_page_size(query, 10);
    pager.next_page().await;
    pager.next_page().await;

    let result = pager.prev_page().await;
    assert!(matches!(result, Err(PagerError::UnsafeReplay(keyword)) if keyword == "DELETE"));
    assert_eq!(pager.page(), 2);

    pager.close().await;
    driver.close().await;
}

#[tokio::test]
async fn test_collect_all_within_cap() {
    let mut driver = memory().await;
    let mut query = Query::new(driver.as_ref(), &series(2 * PAGE_SIZE + 1)).unwrap();
    query.execute().await;

    let collected = query.collect_all(&CancellationToken::new()).await.unwrap();
    assert!(collected.complete);
    assert_eq!(collected.rows.len(), 2 * PAGE_SIZE + 1);
    assert_eq!(collected.rows.last(), Some(&vec![Value::Int(2 * PAGE_SIZE as i64 + 1)]));

    query.close().await;
    driver.close().await;
}

#[tokio::test]
async fn test_collect_all_exactly_at_cap() {
    let mut driver = memory().await;
    let mut query = Query::new(driver.as_ref(), &series(MAX_ROWS)).unwrap();
    query.execute().await;

    let collected = query.collect_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(collected.rows.len(), MAX_ROWS);

    query.close().await;
    driver.close().await;
}

#[tokio::test]
async fn test_collect_all_over_cap() {
    let mut driver = memory().await;
    let mut query = Query::new(driver.as_ref(), &series(MAX_ROWS + 500)).unwrap();
    query.execute().await;

    let result = query.collect_all(&CancellationToken::new()).await;
    assert!(matches!(result, Err(PagerError::CapacityExceeded { limit }) if limit == MAX_ROWS));

    // The connection is usable once the cursor is closed.
    query.close().await;
    let mut check = Query::new(driver.as_ref(), "SELECT 1").unwrap();
    check.execute().await;
    assert_eq!(check.fetch(1).await, vec![vec![Value::Int(1)]]);
    check.close().await;

    driver.close().await;
}

#[tokio::test]
async fn test_collect_all_cancelled() {
    let mut driver = memory().await;
    let mut query = Query::new(driver.as_ref(), &series(500)).unwrap();
    query.execute().await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let collected = query.collect_all(&cancel).await.unwrap();
    assert!(!collected.complete);
    assert!(collected.rows.is_empty());

    query.close().await;
    driver.close().await;
}

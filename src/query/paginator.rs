//! Page-wise navigation over a query's result.

use tracing::{debug, warn};

use super::executor::Query;
use super::{MAX_PAGE_SIZE, PAGE_SIZE};
use crate::db::Row;
use crate::error::{PagerError, Result};

/// One batch of rows handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// 1-based page number; 0 before the first page was fetched.
    pub number: usize,
    pub rows: Vec<Row>,
    /// Set once a page came back empty or exactly full.
    pub is_last: bool,
}

/// Delivers a query's rows in fixed-size pages.
pub struct Paginator<'d> {
    query: Query<'d>,
    page_size: usize,
    current: Page,
}

impl<'d> Paginator<'d> {
    /// Wraps a query with the default page size.
    pub fn new(query: Query<'d>) -> Self {
        Self::with_page_size(query, PAGE_SIZE)
    }

    /// Wraps a query; `page_size` is clamped into `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(query: Query<'d>, page_size: usize) -> Self {
        Self {
            query,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            current: Page::default(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn query(&self) -> &Query<'d> {
        &self.query
    }

    /// Column headers of the result.
    pub fn keys(&self) -> Vec<String> {
        self.query.keys()
    }

    /// Rows of the current page.
    pub fn data(&self) -> &[Row] {
        &self.current.rows
    }

    /// Current page number, 0 before the first page.
    pub fn page(&self) -> usize {
        self.current.number
    }

    pub fn current(&self) -> &Page {
        &self.current
    }

    /// True once a page came back empty or exactly full. A full page may
    /// still be followed by more rows; the next call to `next_page` tells.
    pub fn has_next(&self) -> bool {
        self.current.is_last
    }

    pub fn has_prev(&self) -> bool {
        self.current.number > 1
    }

    /// Fetches the next page.
    pub async fn next_page(&mut self) -> &Page {
        let rows = self.query.fetch(self.page_size).await;

        self.current.number += 1;
        if rows.is_empty() || rows.len() == self.page_size {
            self.current.is_last = true;
        }
        // An empty fetch keeps the page empty rather than showing stale rows.
        self.current.rows = rows;

        debug!(
            "Page {} holds {} rows",
            self.current.number,
            self.current.rows.len()
        );
        &self.current
    }

    /// Moves back one page.
    ///
    /// There is no page cache: the statement is executed again and the rows
    /// before the wanted page are scrolled past. This is only correct for a
    /// deterministic statement without side effects, so statements that
    /// change data are refused with `UnsafeReplay`.
    pub async fn prev_page(&mut self) -> Result<&Page> {
        if !self.has_prev() {
            return Err(PagerError::NoPreviousPage);
        }

        let statement = self.query.statement();
        if statement.is_mutating() {
            warn!("Refusing to replay {} statement", statement.keyword());
            return Err(PagerError::UnsafeReplay(statement.keyword().to_string()));
        }

        self.query.execute().await;
        self.current.number -= 2;
        let skip = self.page_size as u64 * self.current.number as u64;
        self.query.scroll(skip).await;

        Ok(self.next_page().await)
    }

    /// Executes the statement again and starts over at page 0.
    pub async fn rerun(&mut self) {
        self.query.execute().await;
        self.current = Page::default();
    }

    /// Closes the underlying query.
    pub async fn close(mut self) {
        self.query.close().await;
    }
}

//! Query execution.
//!
//! A `Query` submits one statement through a driver and hands out its rows
//! on demand. Execution failures are not propagated: they become the
//! query's terminal error state and are replayed as a one-row result, so the
//! caller can render them like any other data.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::statement::Statement;
use super::{Paginator, MAX_ROWS, PAGE_SIZE};
use crate::db::{Cursor, Driver, Row, Value};
use crate::error::{PagerError, Result};

/// Header reported for a statement without a result description.
const RESULT_KEY: &str = "result";

/// Header reported while the query is in its terminal error state.
const ERROR_KEY: &str = "error";

/// Rows collected by [`Query::collect_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub rows: Vec<Row>,
    /// False when the enumeration was cancelled before the last row.
    pub complete: bool,
}

enum State {
    /// `execute` was never called.
    Created,
    /// The statement ran; rows come from the cursor.
    Open { cursor: Cursor, acknowledged: bool },
    /// The statement failed; `row` is replayed on every fetch.
    Failed { row: Row },
}

/// One statement bound to a driver.
pub struct Query<'d> {
    driver: &'d dyn Driver,
    statement: Statement,
    state: State,
}

impl<'d> Query<'d> {
    /// Prepares the first statement of `sql` for execution on `driver`.
    ///
    /// Any further statements in `sql` are dropped with a warning; see
    /// [`Statement::ignored_statements`].
    pub fn new(driver: &'d dyn Driver, sql: &str) -> Result<Self> {
        let statement = Statement::parse(sql, driver.kind())?;
        if statement.ignored_statements() > 0 {
            warn!(
                "Only the first statement is executed, ignoring {} more",
                statement.ignored_statements()
            );
        }

        Ok(Self {
            driver,
            statement,
            state: State::Created,
        })
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Returns the error text if the last execution failed.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            State::Failed { row } => match row.first() {
                Some(Value::String(message)) => Some(message),
                _ => None,
            },
            _ => None,
        }
    }

    /// Runs the statement, replacing the result of any previous run.
    pub async fn execute(&mut self) {
        self.close().await;

        info!(
            "Executing {} statement ({:?})",
            self.statement.keyword(),
            self.statement.kind()
        );
        debug!("SQL: {}", self.statement.text());

        self.state = match self.driver.execute_raw(self.statement.text()).await {
            Ok(cursor) => State::Open {
                cursor,
                acknowledged: false,
            },
            Err(e) => Self::failed(&e),
        };
    }

    /// Column headers of the current result.
    pub fn keys(&self) -> Vec<String> {
        match &self.state {
            State::Created => Vec::new(),
            State::Failed { .. } => vec![ERROR_KEY.to_string()],
            State::Open { cursor, .. } => match cursor.columns() {
                Some(columns) => columns.to_vec(),
                None => vec![RESULT_KEY.to_string()],
            },
        }
    }

    /// Returns up to `size` rows. Fewer than `size` means the result is
    /// exhausted.
    ///
    /// A statement without a result yields a single `ok` row once. A failed
    /// statement yields its error row on every call.
    pub async fn fetch(&mut self, size: usize) -> Vec<Row> {
        let tabular = self.is_tabular();
        let outcome = match &mut self.state {
            State::Created => return Vec::new(),
            State::Failed { row } => return vec![row.clone()],
            State::Open { acknowledged, .. } if !tabular => {
                if std::mem::replace(acknowledged, true) {
                    return Vec::new();
                }
                return vec![vec![Value::from("ok")]];
            }
            State::Open { cursor, .. } => cursor.fetch_many(size).await,
        };

        match outcome {
            Ok(rows) => rows,
            Err(e) => vec![self.fail(e).await],
        }
    }

    /// Discards up to `n` pending rows.
    pub async fn scroll(&mut self, n: u64) {
        let State::Open { cursor, .. } = &mut self.state else {
            return;
        };

        let scrolled = self.driver.scroll(cursor, n).await;
        if let Err(e) = scrolled {
            self.fail(e).await;
        }
    }

    /// Fetches every remaining row.
    ///
    /// Fails with `CapacityExceeded` once more than [`MAX_ROWS`] rows were
    /// seen. Cancelling `cancel` stops between fetches and returns the rows
    /// collected so far.
    pub async fn collect_all(&mut self, cancel: &CancellationToken) -> Result<Collected> {
        let mut rows = Vec::new();

        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Row enumeration cancelled after {} rows", rows.len());
                    return Ok(Collected { rows, complete: false });
                }
                batch = self.fetch(PAGE_SIZE) => batch,
            };

            let done = batch.len() < PAGE_SIZE || matches!(self.state, State::Failed { .. });
            rows.extend(batch);

            if rows.len() > MAX_ROWS {
                warn!("Row enumeration stopped at the {MAX_ROWS} row cap");
                return Err(PagerError::CapacityExceeded { limit: MAX_ROWS });
            }
            if done {
                return Ok(Collected {
                    rows,
                    complete: true,
                });
            }
        }
    }

    /// Closes the open cursor, if any. The result headers stay available.
    pub async fn close(&mut self) {
        if let State::Open { cursor, .. } = &mut self.state {
            cursor.close().await;
        }
    }

    /// Executes the statement and wraps the query in a [`Paginator`].
    pub async fn paginate(mut self) -> Paginator<'d> {
        self.execute().await;
        Paginator::new(self)
    }

    /// Whether rows come from the cursor. The database's description
    /// decides: a statement it describes no columns for is acknowledged
    /// with `ok`, whatever its leading keyword.
    fn is_tabular(&self) -> bool {
        match &self.state {
            State::Open { cursor, .. } => cursor.columns().is_some(),
            _ => false,
        }
    }

    /// Enters the terminal error state and returns the error row.
    async fn fail(&mut self, error: PagerError) -> Row {
        self.close().await;
        self.state = Self::failed(&error);
        match &self.state {
            State::Failed { row } => row.clone(),
            _ => Vec::new(),
        }
    }

    fn failed(error: &PagerError) -> State {
        warn!("Statement failed: {error}");
        State::Failed {
            row: vec![Value::String(error.to_string())],
        }
    }
}

//! Cursors over executed statements.
//!
//! A driver runs each statement on a background task that holds the
//! connection for as long as the cursor is open. The task converts rows and
//! pushes them through a bounded channel, so only `CURSOR_BUFFER` rows are
//! ever buffered ahead of the consumer. The column names travel separately on
//! a oneshot channel once the first row arrived or the statement completed.

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::Row;
use crate::error::{PagerError, Result};

/// Rows converted ahead of the consumer.
const CURSOR_BUFFER: usize = 256;

type RowItem = Result<Row>;

/// Iteration state over the rows produced by one executed statement.
#[derive(Debug)]
pub struct Cursor {
    columns: Vec<String>,
    rows: mpsc::Receiver<RowItem>,
    exhausted: bool,
    worker: Option<JoinHandle<()>>,
}

impl Cursor {
    /// Creates a cursor that yields the given rows from a background task.
    ///
    /// Used by drivers whose results are not backed by a live connection.
    pub fn from_rows(columns: Vec<String>, rows: Vec<RowItem>) -> Self {
        let (tx, rx) = mpsc::channel(CURSOR_BUFFER);
        let worker = tokio::spawn(async move {
            for row in rows {
                if tx.send(row).await.is_err() {
                    break;
                }
            }
        });

        Self {
            columns,
            rows: rx,
            exhausted: false,
            worker: Some(worker),
        }
    }

    /// Returns the column names of the result, or `None` when the statement
    /// produced no result description (e.g. `UPDATE`).
    pub fn columns(&self) -> Option<&[String]> {
        if self.columns.is_empty() {
            None
        } else {
            Some(&self.columns)
        }
    }

    /// Returns true once the last row was handed out or the cursor was closed.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Pulls up to `size` rows. Fewer than `size` rows means the result is
    /// exhausted.
    pub async fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>> {
        let mut batch = Vec::with_capacity(size.min(CURSOR_BUFFER));

        while batch.len() < size && !self.exhausted {
            match self.rows.recv().await {
                Some(Ok(row)) => batch.push(row),
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Err(e);
                }
                None => self.exhausted = true,
            }
        }

        Ok(batch)
    }

    /// Closes the cursor and waits for its task to let go of the connection.
    ///
    /// Closing twice is a no-op.
    pub async fn close(&mut self) {
        self.rows.close();
        self.exhausted = true;

        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                debug!("Cursor task ended abnormally: {e}");
            }
        }
    }
}

/// Creates the two halves of a cursor: the feed written by the statement
/// task and the pending cursor awaited by the driver.
pub(crate) fn channel() -> (CursorFeed, PendingCursor) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (rows_tx, rows_rx) = mpsc::channel(CURSOR_BUFFER);

    (
        CursorFeed {
            ready: Some(ready_tx),
            rows: rows_tx,
        },
        PendingCursor {
            ready: ready_rx,
            rows: rows_rx,
        },
    )
}

/// How a statement's row stream ended.
pub(crate) enum Pumped {
    /// The database reported an error.
    Failed(sqlx::Error),
    /// The consumer closed the cursor before the last row.
    Detached,
    /// Every row was delivered.
    Finished,
}

/// Writing half of a cursor, owned by the statement task.
pub(crate) struct CursorFeed {
    ready: Option<oneshot::Sender<Result<Vec<String>>>>,
    rows: mpsc::Sender<RowItem>,
}

impl CursorFeed {
    /// Returns true once the consumer has been handed the cursor.
    pub(crate) fn is_announced(&self) -> bool {
        self.ready.is_none()
    }

    /// Hands the cursor to the consumer with the given column names.
    pub(crate) fn announce(&mut self, columns: Vec<String>) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Ok(columns));
        }
    }

    /// Reports a failure: as the result of `execute_raw` while the cursor is
    /// still pending, as the next row item afterwards.
    pub(crate) async fn fail(&mut self, error: PagerError) {
        match self.ready.take() {
            Some(ready) => {
                let _ = ready.send(Err(error));
            }
            None => {
                let _ = self.rows.send(Err(error)).await;
            }
        }
    }

    /// Forwards database rows to the consumer until the stream ends, fails,
    /// or the consumer goes away. The first row announces the cursor.
    pub(crate) async fn pump<S, R>(
        &mut self,
        mut stream: S,
        column_names: fn(&R) -> Vec<String>,
        convert: fn(&R) -> Row,
    ) -> Pumped
    where
        S: Stream<Item = std::result::Result<R, sqlx::Error>> + Unpin,
    {
        while let Some(item) = stream.next().await {
            match item {
                Ok(row) => {
                    if !self.is_announced() {
                        self.announce(column_names(&row));
                    }
                    if self.rows.send(Ok(convert(&row))).await.is_err() {
                        return Pumped::Detached;
                    }
                }
                Err(e) => return Pumped::Failed(e),
            }
        }

        Pumped::Finished
    }
}

/// Reading half of a cursor, awaited by the driver in `execute_raw`.
pub(crate) struct PendingCursor {
    ready: oneshot::Receiver<Result<Vec<String>>>,
    rows: mpsc::Receiver<RowItem>,
}

impl PendingCursor {
    /// Waits until the statement task announced the cursor or failed.
    ///
    /// On failure the task is awaited too, so the rollback has finished and
    /// the connection is free again when the error reaches the caller.
    pub(crate) async fn open(self, worker: JoinHandle<()>) -> Result<Cursor> {
        let PendingCursor { ready, rows } = self;

        match ready.await {
            Ok(Ok(columns)) => Ok(Cursor {
                columns,
                rows,
                exhausted: false,
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                if let Err(join) = worker.await {
                    debug!("Statement task ended abnormally: {join}");
                }
                Err(e)
            }
            Err(_) => {
                let detail = match worker.await {
                    Err(join) => join.to_string(),
                    Ok(()) => "no result reported".to_string(),
                };
                Err(PagerError::execution(format!(
                    "Statement task stopped before completing: {detail}"
                )))
            }
        }
    }
}

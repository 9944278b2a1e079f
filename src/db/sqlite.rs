//! SQLite driver.
//!
//! SQLite values are dynamically typed, so conversion looks at the storage
//! class of each value rather than the declared column type.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{
    Column as _, Connection, Executor, Row as SqlxRow, SqliteConnection, TypeInfo, ValueRef,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use super::cursor::{self, CursorFeed, Pumped};
use super::slot::ConnectionSlot;
use super::{column_names, error_message, Cursor, Driver, Row, Value};
use crate::connection::{DriverKind, SQLITE_MEMORY};
use crate::error::{PagerError, Result};
use crate::query::Statement;

/// Driver for a SQLite file or in-memory database.
pub struct SqliteDriver {
    path: String,
    slot: ConnectionSlot<SqliteConnection>,
}

impl SqliteDriver {
    /// Creates a driver for the given path (`:memory:` for an in-memory database).
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            slot: ConnectionSlot::new(),
        }
    }

    /// Returns the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn connect_options(&self) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
        if self.path == SQLITE_MEMORY {
            SqliteConnectOptions::from_str("sqlite::memory:")
        } else {
            Ok(SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true))
        }
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Sqlite
    }

    fn url(&self) -> String {
        format!("sqlite://{}", self.path)
    }

    async fn connect(&mut self) -> Result<()> {
        let options = self.connect_options().map_err(PagerError::Connect)?;
        let conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(PagerError::Connect)?;
        debug!("Opened sqlite database {}", self.path);
        self.slot.install(conn).await;
        Ok(())
    }

    async fn execute_raw(&self, sql: &str) -> Result<Cursor> {
        let conn = self.slot.checkout().await;
        if conn.is_none() {
            return Err(PagerError::NotConnected);
        }

        let (feed, pending) = cursor::channel();
        let worker = tokio::spawn(run_statement(conn, sql.to_string(), feed));
        pending.open(worker).await
    }

    async fn close(&mut self) {
        self.slot.release().await;
    }
}

/// Runs one statement and feeds its rows to the cursor.
///
/// Statements that modify data run in a transaction that commits once the
/// last row was read. Everything else runs in autocommit mode: SQLite
/// refuses `VACUUM` and `PRAGMA journal_mode` inside a transaction and
/// silently ignores `PRAGMA foreign_keys` there.
async fn run_statement(
    mut slot: OwnedMutexGuard<Option<SqliteConnection>>,
    sql: String,
    mut feed: CursorFeed,
) {
    let Some(conn) = slot.as_mut() else {
        feed.fail(PagerError::NotConnected).await;
        return;
    };

    let transactional = Statement::parse(&sql, DriverKind::Sqlite)
        .map(|statement| statement.modifies_data())
        .unwrap_or(false);

    let streamed = if transactional {
        stream_in_transaction(conn, &sql, &mut feed).await
    } else {
        stream(conn, &sql, &mut feed).await
    };

    match streamed {
        Ok(columns) => feed.announce(columns),
        Err(e) => feed.fail(PagerError::execution(error_message(&e))).await,
    }
}

async fn stream_in_transaction(
    conn: &mut SqliteConnection,
    sql: &str,
    feed: &mut CursorFeed,
) -> std::result::Result<Vec<String>, sqlx::Error> {
    let mut tx = conn.begin().await?;
    match stream(&mut tx, sql, feed).await {
        Ok(columns) => {
            tx.commit().await?;
            Ok(columns)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback after failed statement also failed: {rollback}");
            }
            Err(e)
        }
    }
}

/// Pumps the statement's rows into `feed`. Returns the column names still
/// to announce: empty when a row already announced them, otherwise the
/// statement's description.
async fn stream(
    conn: &mut SqliteConnection,
    sql: &str,
    feed: &mut CursorFeed,
) -> std::result::Result<Vec<String>, sqlx::Error> {
    let pumped = {
        let rows = sqlx::query(sql).persistent(false).fetch(&mut *conn);
        feed.pump(rows, column_names::<SqliteRow>, convert_row).await
    };

    match pumped {
        Pumped::Failed(e) => Err(e),
        Pumped::Detached | Pumped::Finished if feed.is_announced() => Ok(Vec::new()),
        Pumped::Detached | Pumped::Finished => match (&mut *conn).describe(sql).await {
            Ok(described) => Ok(described
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect()),
            Err(e) => {
                debug!("No result description available: {e}");
                Ok(Vec::new())
            }
        },
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.len()).map(|i| convert_value(row, i)).collect()
}

/// Converts a single value by its storage class.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    let converted = match type_name.as_str() {
        "INTEGER" | "INT8" | "BIGINT" | "INT" => {
            row.try_get::<i64, _>(index).ok().map(Value::Int)
        }
        "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(Value::Bool),
        "REAL" | "NUMERIC" | "FLOAT" | "DOUBLE" => {
            row.try_get::<f64, _>(index).ok().map(Value::Float)
        }
        "BLOB" => row.try_get::<Vec<u8>, _>(index).ok().map(Value::Bytes),
        _ => row.try_get::<String, _>(index).ok().map(Value::String),
    };

    converted.unwrap_or(Value::Unsupported(type_name))
}

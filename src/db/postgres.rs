//! PostgreSQL driver.
//!
//! Provides the `PostgresDriver` struct that implements the `Driver` trait
//! over a single `PgConnection`.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{JsonValue, Uuid};
use sqlx::{Column as _, Connection, Executor, PgConnection, Row as SqlxRow, TypeInfo, ValueRef};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use super::cursor::{self, CursorFeed, Pumped};
use super::slot::ConnectionSlot;
use super::{column_names, Cursor, Driver, Row, Value};
use crate::connection::{DriverKind, ServerAddress};
use crate::error::{PagerError, Result};
use crate::query::Statement;

/// Driver for a PostgreSQL server.
///
/// `scroll` uses the trait's chunked discard rather than a server-side
/// `MOVE FORWARD`. Rows arrive over an already running portal and up to the
/// cursor buffer is converted ahead of the reader, so a `DECLARE`d cursor
/// would need its own fetch loop. Skipped rows therefore still cross the
/// wire once.
pub struct PostgresDriver {
    address: ServerAddress,
    slot: ConnectionSlot<PgConnection>,
}

impl PostgresDriver {
    /// Creates a driver for the given server address.
    pub fn new(address: ServerAddress) -> Self {
        Self {
            address,
            slot: ConnectionSlot::new(),
        }
    }

    fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new();
        if let Some(host) = &self.address.host {
            options = options.host(host);
        }
        if let Some(port) = self.address.port {
            options = options.port(port);
        }
        if let Some(user) = &self.address.user {
            options = options.username(user);
        }
        if let Some(password) = &self.address.password {
            options = options.password(password);
        }
        if !self.address.database.is_empty() {
            options = options.database(&self.address.database);
        }
        options
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Postgres
    }

    fn url(&self) -> String {
        format!("postgres://{}", self.address.display_location())
    }

    async fn connect(&mut self) -> Result<()> {
        let conn = PgConnection::connect_with(&self.connect_options())
            .await
            .map_err(PagerError::Connect)?;
        debug!("Opened postgres connection to {}", self.address.display_location());
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

/// Runs one statement and feeds its rows to the cursor. Only statements
/// that modify data get a transaction; `VACUUM`, `CREATE DATABASE` and
/// `CREATE INDEX CONCURRENTLY` refuse to run inside one.
async fn run_statement(
    mut slot: OwnedMutexGuard<Option<PgConnection>>,
    sql: String,
    mut feed: CursorFeed,
) {
    let Some(conn) = slot.as_mut() else {
        feed.fail(PagerError::NotConnected).await;
        return;
    };

    let transactional = Statement::parse(&sql, DriverKind::Postgres)
        .map(|statement| statement.modifies_data())
        .unwrap_or(false);

    let streamed = if transactional {
        stream_in_transaction(conn, &sql, &mut feed).await
    } else {
        stream(conn, &sql, &mut feed).await
    };

    match streamed {
        Ok(columns) => feed.announce(columns),
        Err(e) => feed.fail(PagerError::execution(format_query_error(&e))).await,
    }
}

async fn stream_in_transaction(
    conn: &mut PgConnection,
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

/// Pumps rows into `feed`; returns the column names still to announce.
async fn stream(
    conn: &mut PgConnection,
    sql: &str,
    feed: &mut CursorFeed,
) -> std::result::Result<Vec<String>, sqlx::Error> {
    let pumped = {
        let rows = sqlx::query(sql).persistent(false).fetch(&mut *conn);
        feed.pump(rows, column_names::<PgRow>, convert_row).await
    };

    match pumped {
        Pumped::Failed(e) => Err(e),
        Pumped::Detached | Pumped::Finished if feed.is_announced() => Ok(Vec::new()),
        // Empty result: the statement description still names the columns.
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

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    let type_name = type_name.to_uppercase();
    let converted = match type_name.as_str() {
        "BOOL" | "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(Value::Bool),
        "INT2" | "SMALLINT" => row
            .try_get::<i16, _>(index)
            .ok()
            .map(|v| Value::Int(v as i64)),
        "INT4" | "INT" | "INTEGER" => row
            .try_get::<i32, _>(index)
            .ok()
            .map(|v| Value::Int(v as i64)),
        "INT8" | "BIGINT" => row.try_get::<i64, _>(index).ok().map(Value::Int),
        "FLOAT4" | "REAL" => row
            .try_get::<f32, _>(index)
            .ok()
            .map(|v| Value::Float(v as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => row.try_get::<f64, _>(index).ok().map(Value::Float),
        "BYTEA" => row.try_get::<Vec<u8>, _>(index).ok().map(Value::Bytes),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .ok()
            .map(|v| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .ok()
            .map(|v| Value::String(v.to_string())),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .ok()
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .ok()
            .map(|v| Value::String(v.to_string())),
        "UUID" => row
            .try_get::<Uuid, _>(index)
            .ok()
            .map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => row
            .try_get::<JsonValue, _>(index)
            .ok()
            .map(|v| Value::String(v.to_string())),
        // Everything else is decoded as text when the type allows it.
        _ => row.try_get::<String, _>(index).ok().map(Value::String),
    };

    converted.unwrap_or(Value::Unsupported(type_name))
}

/// Formats a query error with the server's detail and hint if available.
fn format_query_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
        if let Some(table) = pg_error.table() {
            result.push_str("\n  TABLE: ");
            result.push_str(table);
        }
        if let Some(column) = pg_error.column() {
            result.push_str("\n  COLUMN: ");
            result.push_str(column);
        }
        if let Some(constraint) = pg_error.constraint() {
            result.push_str("\n  CONSTRAINT: ");
            result.push_str(constraint);
        }
    }

    result
}

//! MySQL driver.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::JsonValue;
use sqlx::{
    Column as _, Connection, Executor, MySqlConnection, Row as SqlxRow, TypeInfo, ValueRef,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use super::cursor::{self, CursorFeed, Pumped};
use super::slot::ConnectionSlot;
use super::{column_names, error_message, Cursor, Driver, Row, Value};
use crate::connection::{DriverKind, ServerAddress};
use crate::error::{PagerError, Result};
use crate::query::Statement;

/// Driver for a MySQL or MariaDB server.
pub struct MySqlDriver {
    address: ServerAddress,
    slot: ConnectionSlot<MySqlConnection>,
}

impl MySqlDriver {
    /// Creates a driver for the given server address.
    pub fn new(address: ServerAddress) -> Self {
        Self {
            address,
            slot: ConnectionSlot::new(),
        }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new();
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
impl Driver for MySqlDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::MySql
    }

    fn url(&self) -> String {
        format!("mysql://{}", self.address.display_location())
    }

    async fn connect(&mut self) -> Result<()> {
        let conn = MySqlConnection::connect_with(&self.connect_options())
            .await
            .map_err(PagerError::Connect)?;
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
/// DDL commits implicitly on MySQL, so only data-modifying statements are
/// wrapped in a transaction.
async fn run_statement(
    mut slot: OwnedMutexGuard<Option<MySqlConnection>>,
    sql: String,
    mut feed: CursorFeed,
) {
    let Some(conn) = slot.as_mut() else {
        feed.fail(PagerError::NotConnected).await;
        return;
    };

    let transactional = Statement::parse(&sql, DriverKind::MySql)
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
    conn: &mut MySqlConnection,
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

async fn stream(
    conn: &mut MySqlConnection,
    sql: &str,
    feed: &mut CursorFeed,
) -> std::result::Result<Vec<String>, sqlx::Error> {
    let pumped = {
        let rows = sqlx::query(sql).persistent(false).fetch(&mut *conn);
        feed.pump(rows, column_names::<MySqlRow>, convert_row).await
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

fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value by its declared MySQL type.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    let type_name = type_name.to_uppercase();
    let converted = match type_name.as_str() {
        "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(index).ok().map(Value::Int)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get::<u64, _>(index).ok().map(|v| match i64::try_from(v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::String(v.to_string()),
        }),
        "FLOAT" => row
            .try_get::<f32, _>(index)
            .ok()
            .map(|v| Value::Float(v as f64)),
        "DOUBLE" => row.try_get::<f64, _>(index).ok().map(Value::Float),
        // DECIMAL travels as text; keep it exact.
        "DECIMAL" => row
            .try_get_unchecked::<String, _>(index)
            .ok()
            .map(Value::String),
        "TIMESTAMP" => row
            .try_get::<DateTime<Utc>, _>(index)
            .ok()
            .map(|v| Value::String(v.to_rfc3339())),
        "DATETIME" => row
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
        "JSON" => row
            .try_get::<JsonValue, _>(index)
            .ok()
            .map(|v| Value::String(v.to_string())),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            row.try_get::<Vec<u8>, _>(index).ok().map(Value::Bytes)
        }
        _ => row.try_get::<String, _>(index).ok().map(Value::String),
    };

    converted.unwrap_or(Value::Unsupported(type_name))
}

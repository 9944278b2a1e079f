//! Database drivers for db-pager.
//!
//! Provides a trait-based interface over one physical connection, allowing
//! the SQLite, PostgreSQL and MySQL backends to be used interchangeably.

mod cursor;
mod mock;
mod mysql;
mod postgres;
mod slot;
mod sqlite;
mod types;

pub use cursor::Cursor;
pub use mock::{MockDriver, MockResponse};
pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;
pub use types::{Row, Value};

use crate::connection::{ConnectionDescriptor, ConnectionParser, DriverKind};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::Column as _;
use tracing::info;

/// Rows discarded per fetch while scrolling a cursor.
pub const SCROLL_CHUNK: u64 = 10_000;

/// Creates the driver for a descriptor without connecting it.
///
/// This is the central factory for database drivers.
pub fn driver_for(descriptor: ConnectionDescriptor) -> Box<dyn Driver> {
    match descriptor {
        ConnectionDescriptor::Sqlite { path } => Box::new(SqliteDriver::new(path)),
        ConnectionDescriptor::Postgres(address) => Box::new(PostgresDriver::new(address)),
        ConnectionDescriptor::MySql(address) => Box::new(MySqlDriver::new(address)),
    }
}

/// Creates and connects the driver for a descriptor.
pub async fn connect(descriptor: ConnectionDescriptor) -> Result<Box<dyn Driver>> {
    let mut driver = driver_for(descriptor);
    driver.connect().await?;
    info!("Connected to {}", driver.url());
    Ok(driver)
}

/// Parses a connection string with the default scheme table and connects.
pub async fn open(connection_string: &str) -> Result<Box<dyn Driver>> {
    let descriptor = ConnectionParser::default().parse(connection_string)?;
    connect(descriptor).await
}

/// Trait defining the interface for database drivers.
///
/// A driver owns at most one physical connection. Statements run one at a
/// time: while a cursor is open, the next `execute_raw` waits for it.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Returns the backend this driver talks to.
    fn kind(&self) -> DriverKind;

    /// Returns a display URL (scheme plus host/database), never credentials.
    fn url(&self) -> String;

    /// Opens the physical connection.
    async fn connect(&mut self) -> Result<()>;

    /// Runs one statement and returns a cursor over its rows.
    ///
    /// Statements that modify data run in a transaction that commits on
    /// success and is rolled back before an error is returned. Everything
    /// else runs in autocommit mode.
    async fn execute_raw(&self, sql: &str) -> Result<Cursor>;

    /// Discards up to `n` pending rows from `cursor`.
    ///
    /// Rows are fetched and dropped in chunks of [`SCROLL_CHUNK`] so peak
    /// memory stays bounded without one round trip per row.
    async fn scroll(&self, cursor: &mut Cursor, n: u64) -> Result<()> {
        let mut remaining = n;
        while remaining > 0 {
            let chunk = remaining.min(SCROLL_CHUNK);
            let fetched = cursor.fetch_many(chunk as usize).await?.len() as u64;
            if fetched < chunk {
                break;
            }
            remaining -= chunk;
        }
        Ok(())
    }

    /// Closes the connection. Closing twice, or without ever connecting, is
    /// a no-op, and errors are never reported.
    async fn close(&mut self);
}

/// Column names of a database row.
pub(crate) fn column_names<R: sqlx::Row>(row: &R) -> Vec<String> {
    row.columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect()
}

/// Text reported for a failed statement: the database's own message when
/// there is one.
pub(crate) fn error_message(error: &sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}

//! Mock driver for testing.
//!
//! Answers statements from a script instead of a database, and counts how
//! often it was asked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Cursor, Driver, Row, Value};
use crate::connection::DriverKind;
use crate::error::{PagerError, Result};

/// Scripted answer to one statement.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A result set.
    Rows { columns: Vec<String>, rows: Vec<Row> },
    /// A result set that fails after its rows were delivered.
    RowsThenError {
        columns: Vec<String>,
        rows: Vec<Row>,
        message: String,
    },
    /// A statement without a result description.
    Command,
    /// The database rejects the statement.
    Error(String),
}

impl MockResponse {
    /// A result set with the given column names and rows.
    pub fn rows(columns: &[&str], rows: Vec<Row>) -> Self {
        Self::Rows {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// A single column `n` holding the numbers `1..=count`.
    pub fn numbered(count: usize) -> Self {
        Self::rows(
            &["n"],
            (1..=count as i64).map(|n| vec![Value::Int(n)]).collect(),
        )
    }

    /// A rejected statement.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

/// A driver that answers from a script.
#[derive(Debug, Default)]
pub struct MockDriver {
    responses: HashMap<String, MockResponse>,
    connected: bool,
    executions: AtomicUsize,
}

impl MockDriver {
    /// Creates an unconnected driver with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for a statement text.
    pub fn on(mut self, sql: &str, response: MockResponse) -> Self {
        self.responses.insert(sql.trim().to_string(), response);
        self
    }

    /// Number of `execute_raw` calls so far, failed ones included.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Sqlite
    }

    fn url(&self) -> String {
        "mock://memory".to_string()
    }

    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn execute_raw(&self, sql: &str) -> Result<Cursor> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if !self.connected {
            return Err(PagerError::NotConnected);
        }

        match self.responses.get(sql.trim()) {
            Some(MockResponse::Rows { columns, rows }) => Ok(Cursor::from_rows(
                columns.clone(),
                rows.iter().cloned().map(Ok).collect(),
            )),
            Some(MockResponse::RowsThenError {
                columns,
                rows,
                message,
            }) => {
                let mut items: Vec<Result<Row>> = rows.iter().cloned().map(Ok).collect();
                items.push(Err(PagerError::execution(message.clone())));
                Ok(Cursor::from_rows(columns.clone(), items))
            }
            Some(MockResponse::Command) => Ok(Cursor::from_rows(Vec::new(), Vec::new())),
            Some(MockResponse::Error(message)) => Err(PagerError::execution(message.clone())),
            None => Err(PagerError::execution(format!("no such statement: {sql}"))),
        }
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

//! Error types for db-pager.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for db-pager operations.
#[derive(Error, Debug)]
pub enum PagerError {
    /// The connection string names a scheme no driver is registered for.
    #[error("Unsupported driver: '{0}'")]
    UnsupportedDriver(String),

    /// A SQLite file name contains characters outside the allowed set.
    #[error("Bad sqlite database name: '{0}'")]
    InvalidDatabaseName(String),

    /// A SQLite file name has an extension outside the allow-list.
    #[error("Bad sqlite database extension: '{0}'")]
    InvalidExtension(String),

    /// The connection string could not be parsed at all.
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Opening the physical connection failed (auth, network, file access).
    #[error("Connection error: {0}")]
    Connect(#[source] sqlx::Error),

    /// A driver was used before `connect` or after `close`.
    #[error("Not connected")]
    NotConnected,

    /// The SQL text holds no statement.
    #[error("Bad query: no statement found")]
    NoStatement,

    /// The database rejected the statement.
    #[error("Execution error: {0}")]
    Execution(String),

    /// `prev_page` was called on the first page or before any page.
    #[error("Previous page does not exist")]
    NoPreviousPage,

    /// `prev_page` would have to re-run a statement with side effects.
    #[error("Refusing to re-run {0} statement to reach the previous page")]
    UnsafeReplay(String),

    /// The unbounded row enumeration went past its safety cap.
    #[error("Result has more than {limit} rows. Narrow the query with LIMIT/OFFSET or page through it")]
    CapacityExceeded { limit: usize },

    /// Configuration errors (invalid config file, unknown connection name, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Terminal I/O errors in the shell.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PagerError {
    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedDriver(_)
            | Self::InvalidDatabaseName(_)
            | Self::InvalidExtension(_)
            | Self::InvalidConnectionString(_) => "Connection String Error",
            Self::Connect(_) | Self::NotConnected => "Connection Error",
            Self::NoStatement | Self::Execution(_) => "Query Error",
            Self::NoPreviousPage | Self::UnsafeReplay(_) | Self::CapacityExceeded { .. } => {
                "Pagination Error"
            }
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
        }
    }
}

/// Result type alias using PagerError.
pub type Result<T> = std::result::Result<T, PagerError>;

//! Connection strings and the descriptors parsed from them.
//!
//! A descriptor carries only the fields its backend understands: SQLite gets a
//! path, the network backends get a [`ServerAddress`].

mod parser;

pub use parser::{ConnectionParser, SQLITE_EXTENSIONS};

use std::fmt;

/// Target used when a connection string names no SQLite file.
pub const SQLITE_MEMORY: &str = ":memory:";

/// Connection string assumed when the user enters nothing.
pub const DEFAULT_CONNECTION_STRING: &str = "sqlite://:memory:";

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Sqlite,
    Postgres,
    MySql,
}

impl DriverKind {
    /// Returns the canonical URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "SQLite"),
            Self::Postgres => write!(f, "PostgreSQL"),
            Self::MySql => write!(f, "MySQL"),
        }
    }
}

/// Host, credentials and database of a network backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Database name; empty when the connection string has no path.
    pub database: String,
}

impl ServerAddress {
    /// Returns `host[:port]/database` without credentials.
    pub fn display_location(&self) -> String {
        let host = self.host.as_deref().unwrap_or("localhost");
        match self.port {
            Some(port) => format!("{host}:{port}/{}", self.database),
            None => format!("{host}/{}", self.database),
        }
    }
}

/// Everything needed to open one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    Sqlite { path: String },
    Postgres(ServerAddress),
    MySql(ServerAddress),
}

impl ConnectionDescriptor {
    /// Returns the backend this descriptor targets.
    pub fn kind(&self) -> DriverKind {
        match self {
            Self::Sqlite { .. } => DriverKind::Sqlite,
            Self::Postgres(_) => DriverKind::Postgres,
            Self::MySql(_) => DriverKind::MySql,
        }
    }

    /// Returns a display URL: scheme plus host/database or path, never credentials.
    pub fn display_url(&self) -> String {
        match self {
            Self::Sqlite { path } => format!("sqlite://{path}"),
            Self::Postgres(addr) | Self::MySql(addr) => {
                format!("{}://{}", self.kind().url_scheme(), addr.display_location())
            }
        }
    }
}

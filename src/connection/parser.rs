//! Connection string parsing.
//!
//! `sqlite` targets are file paths rather than network locations, so they are
//! split by hand (the `url` crate would read `:memory:` as an invalid port).
//! Network schemes go through [`url::Url`].

use std::path::Path;

use regex::Regex;
use url::Url;

use super::{
    ConnectionDescriptor, DriverKind, ServerAddress, DEFAULT_CONNECTION_STRING, SQLITE_MEMORY,
};
use crate::error::{PagerError, Result};

/// File extensions accepted for SQLite databases.
pub const SQLITE_EXTENSIONS: &[&str] = &[
    "db", "sdb", "sqlite", "db3", "s3db", "sqlite3", "sl3", "db2", "s2db", "sqlite2", "sl2",
];

const DEFAULT_SCHEMES: &[(&str, DriverKind)] = &[
    ("sqlite", DriverKind::Sqlite),
    ("postgres", DriverKind::Postgres),
    ("postgresql", DriverKind::Postgres),
    ("pgsql", DriverKind::Postgres),
    ("mysql", DriverKind::MySql),
];

/// Parses connection strings against an explicit scheme allow-list.
#[derive(Debug, Clone)]
pub struct ConnectionParser {
    schemes: Vec<(String, DriverKind)>,
}

impl Default for ConnectionParser {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMES)
    }
}

impl ConnectionParser {
    /// Creates a parser that accepts exactly the given schemes.
    pub fn new(schemes: &[(&str, DriverKind)]) -> Self {
        Self {
            schemes: schemes
                .iter()
                .map(|(scheme, kind)| (scheme.to_string(), *kind))
                .collect(),
        }
    }

    /// Returns the backend registered for `scheme`, if any.
    pub fn kind_for(&self, scheme: &str) -> Option<DriverKind> {
        self.schemes
            .iter()
            .find(|(known, _)| known == scheme)
            .map(|(_, kind)| *kind)
    }

    /// Parses a connection string into a descriptor.
    ///
    /// An empty string means `sqlite://:memory:`.
    pub fn parse(&self, connection_string: &str) -> Result<ConnectionDescriptor> {
        let trimmed = connection_string.trim();
        let input = if trimmed.is_empty() {
            DEFAULT_CONNECTION_STRING
        } else {
            trimmed
        };

        let (scheme, rest) = input.split_once("://").unwrap_or(("", input));
        let kind = self
            .kind_for(scheme)
            .ok_or_else(|| PagerError::UnsupportedDriver(scheme.to_string()))?;

        match kind {
            DriverKind::Sqlite => Ok(ConnectionDescriptor::Sqlite {
                path: parse_sqlite_target(rest)?,
            }),
            DriverKind::Postgres => Ok(ConnectionDescriptor::Postgres(parse_server(input)?)),
            DriverKind::MySql => Ok(ConnectionDescriptor::MySql(parse_server(input)?)),
        }
    }
}

/// Resolves the SQLite target from everything after `sqlite://`.
///
/// The path part wins over the host part; both empty means in-memory.
fn parse_sqlite_target(rest: &str) -> Result<String> {
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    let target = if !path.is_empty() { path } else { host };

    if target.is_empty() || target == SQLITE_MEMORY {
        return Ok(SQLITE_MEMORY.to_string());
    }

    validate_sqlite_filename(target)?;
    Ok(target.to_string())
}

/// Characters allowed in a SQLite file name.
const SQLITE_NAME_PATTERN: &str = r"^[A-Za-z0-9_\-\.\\]+$";

/// Checks the base name of a SQLite path: allowed characters and extension.
fn validate_sqlite_filename(path: &str) -> Result<()> {
    let filename = path.rsplit('/').next().unwrap_or(path);

    let pattern = Regex::new(SQLITE_NAME_PATTERN)
        .map_err(|e| PagerError::InvalidConnectionString(e.to_string()))?;
    if !pattern.is_match(filename) {
        return Err(PagerError::InvalidDatabaseName(filename.to_string()));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    if !SQLITE_EXTENSIONS.contains(&extension) {
        return Err(PagerError::InvalidExtension(filename.to_string()));
    }

    Ok(())
}

/// Extracts host, port, credentials and database from a network URL.
fn parse_server(input: &str) -> Result<ServerAddress> {
    let url = Url::parse(input).map_err(|e| PagerError::InvalidConnectionString(e.to_string()))?;

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .map(String::from);
    let user = if url.username().is_empty() {
        None
    } else {
        Some(url.username().to_string())
    };

    Ok(ServerAddress {
        host,
        port: url.port(),
        user,
        password: url.password().map(String::from),
        database: url.path().trim_start_matches('/').to_string(),
    })
}

//! Configuration management for db-pager.
//!
//! Handles loading configuration from a TOML file with named connection
//! strings, and resolving which connection string a run uses.

use crate::connection::{ConnectionParser, DEFAULT_CONNECTION_STRING};
use crate::error::{PagerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable consulted when neither the command line nor the
/// config file names a connection.
pub const URL_ENV_VAR: &str = "DB_PAGER_URL";

/// Main configuration structure for db-pager.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Name of the connection used when none is given.
    pub default_connection: Option<String>,

    /// Rows per page for interactive and one-shot output.
    pub page_size: Option<usize>,

    /// Named database connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

/// A named database connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Connection string, e.g. `postgres://reader@db.example.com/app`.
    pub url: String,
}

impl ConnectionConfig {
    /// Returns a display-safe string (no credentials).
    pub fn display_string(&self) -> String {
        match ConnectionParser::default().parse(&self.url) {
            Ok(descriptor) => descriptor.display_url(),
            Err(_) => "<invalid connection string>".to_string(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-pager")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| PagerError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            PagerError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionConfig> {
        let key = name.or(self.default_connection.as_deref())?;
        self.connections.get(key)
    }

    /// Picks the connection string for a run.
    ///
    /// Precedence: an explicit connection string, the named connection, the
    /// configured default connection, `env_url`, then an in-memory SQLite
    /// database. Naming a connection the file does not define is an error.
    pub fn resolve_connection_string(
        &self,
        explicit: Option<&str>,
        name: Option<&str>,
        env_url: Option<String>,
    ) -> Result<String> {
        if let Some(url) = explicit {
            return Ok(url.to_string());
        }

        if let Some(name) = name {
            return self
                .connections
                .get(name)
                .map(|conn| conn.url.clone())
                .ok_or_else(|| {
                    PagerError::config(format!("Connection '{name}' not found in config file"))
                });
        }

        if let Some(default) = &self.default_connection {
            let conn = self.connections.get(default).ok_or_else(|| {
                PagerError::config(format!(
                    "Default connection '{default}' not found in config file"
                ))
            })?;
            return Ok(conn.url.clone());
        }

        Ok(env_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONNECTION_STRING.to_string()))
    }
}

//! db-pager - run SQL against SQLite, PostgreSQL or MySQL and page through
//! the result.
//!
//! This library exposes the core modules for the binary and for integration
//! tests.

pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod output;
pub mod query;
pub mod shell;

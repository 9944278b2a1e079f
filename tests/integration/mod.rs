//! Integration tests for db-pager.

pub mod mysql_test;
pub mod pagination_test;
pub mod postgres_test;
pub mod sqlite_test;

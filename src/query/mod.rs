//! Statement execution and pagination.
//!
//! A [`Query`] runs one statement through a driver; a [`Paginator`] hands its
//! rows out page by page.

mod executor;
mod paginator;
mod statement;

pub use executor::{Collected, Query};
pub use paginator::{Page, Paginator};
pub use statement::{Statement, StatementKind};

/// Default number of rows per page.
pub const PAGE_SIZE: usize = 1000;

/// Largest page size a paginator accepts.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Cap on the rows [`Query::collect_all`] enumerates.
pub const MAX_ROWS: usize = 10_000;

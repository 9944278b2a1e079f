//! The single physical connection owned by a driver.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Holds at most one open connection.
///
/// A statement task checks the connection out for as long as its cursor is
/// open, so a second statement (or `release`) waits for the first cursor.
pub(crate) struct ConnectionSlot<C> {
    inner: Arc<Mutex<Option<C>>>,
}

impl<C: sqlx::Connection> ConnectionSlot<C> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Stores a freshly opened connection, closing any previous one.
    pub(crate) async fn install(&self, conn: C) {
        let previous = self.inner.lock().await.replace(conn);
        if let Some(previous) = previous {
            close_quietly(previous).await;
        }
    }

    /// Locks the connection for one statement.
    pub(crate) async fn checkout(&self) -> OwnedMutexGuard<Option<C>> {
        Arc::clone(&self.inner).lock_owned().await
    }

    /// Closes the connection if there is one. Never fails.
    pub(crate) async fn release(&self) {
        let conn = self.inner.lock().await.take();
        match conn {
            Some(conn) => close_quietly(conn).await,
            None => debug!("Release requested with no open connection"),
        }
    }
}

async fn close_quietly<C: sqlx::Connection>(conn: C) {
    if let Err(e) = conn.close().await {
        debug!("Ignoring error while closing connection: {e}");
    }
}

//! # Unit of Work
//!
//! A write transaction that takes SQLite's write lock up front.
//!
//! ```text
//!   BEGIN (deferred)                       BEGIN IMMEDIATE
//!   ────────────────                       ───────────────
//!   A: read stock=5                        A: lock ──► read ──► write ──► COMMIT
//!   B: read stock=5                        B: waits (busy_timeout) ─────────────► lock ──► read stock'=...
//!   A: upgrade to write ✓
//!   B: upgrade to write ✗ SQLITE_BUSY
//! ```
//!
//! Everything a sale or refund writes goes through one `UnitOfWork`; it
//! either commits as a whole or rolls back as a whole. If it is dropped
//! without `commit`/`rollback` the connection is detached and closed, which
//! makes SQLite discard the open transaction.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::warn;

use crate::error::{DbError, DbResult};

pub struct UnitOfWork {
    conn: Option<PoolConnection<Sqlite>>,
}

impl UnitOfWork {
    /// Acquires a connection and opens an IMMEDIATE transaction on it.
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(UnitOfWork { conn: Some(conn) })
    }

    /// The connection every statement of this unit of work must run on.
    pub fn conn(&mut self) -> DbResult<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| DbError::Internal("unit of work already finished".to_string()))
    }

    pub async fn commit(mut self) -> DbResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
            if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %rollback_err, "Rollback after failed commit also failed");
                drop(conn.detach());
            }
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn rollback(mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            warn!(error = %e, "Rollback failed, discarding connection");
            drop(conn.detach());
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Never hand a connection with an open transaction back to the pool.
            drop(conn.detach());
        }
    }
}

//! # Database Error Types
//!
//! Error types for database operations and for the sale orchestrator.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                    is_retryable(): BUSY / LOCKED / number race │
//! │       ▼                                                                 │
//! │  SaleError = Core(CoreError) | Db(DbError)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  status_code() → 400 / 404 / 409 / 500 at the HTTP boundary            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kasir_core::{CoreError, ValidationError};
use thiserror::Error;

/// SQLite primary result codes we care about.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Payload rejected before it reached SQL.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting duplicate SKU
    /// - Two sales racing for the same transaction number
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing non-existent user_id or category_id
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. `stock >= 0`).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Another writer holds the database lock (SQLITE_BUSY / SQLITE_LOCKED).
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    ///
    /// ## When This Occurs
    /// - Invalid SQL in migration
    /// - Migration version conflict
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Concurrent-modification failures that succeed if the whole unit of
    /// work runs again.
    ///
    /// ```text
    /// Busy                                        → retry
    /// PoolExhausted                               → retry
    /// UniqueViolation on transactions.number      → retry (re-count)
    /// anything else                               → surface
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Busy(_) | DbError::PoolExhausted => true,
            DbError::UniqueViolation { field, .. } => {
                field.contains("transactions.transaction_number")
            }
            _ => false,
        }
    }

    /// HTTP-equivalent status class.
    pub fn status_code(&self) -> u16 {
        match self {
            DbError::Validation(_) => 400,
            DbError::NotFound { .. } => 404,
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => 400,
            DbError::CheckViolation { .. } => 400,
            DbError::Busy(_) => 409,
            _ => 500,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → code BUSY/LOCKED → Busy
///                               message → Unique / ForeignKey / Check
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // Extended codes carry the primary code in the low byte
                // (517 = BUSY_SNAPSHOT, 262 = LOCKED_SHAREDCACHE, ...).
                let primary = db_err
                    .code()
                    .and_then(|c| c.parse::<i32>().ok())
                    .map(|c| c & 0xff);

                if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
                    || msg.contains("database is locked")
                {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Sale Error
// =============================================================================

/// Everything [`SaleService`](crate::service::SaleService) can fail with.
///
/// Domain outcomes (validation, stock, not found, exhausted retries) are
/// `Core`; anything else the storage layer reports is `Db`.
#[derive(Debug, Error)]
pub enum SaleError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl SaleError {
    pub fn status_code(&self) -> u16 {
        match self {
            SaleError::Core(e) => e.status_code(),
            SaleError::Db(e) => e.status_code(),
        }
    }

    /// True when retrying the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SaleError::Db(e) if e.is_retryable())
    }
}

impl From<ValidationError> for SaleError {
    fn from(err: ValidationError) -> Self {
        SaleError::Core(CoreError::Validation(err))
    }
}

pub type SaleResult<T> = Result<T, SaleError>;

//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Lending rule (CoreError)          │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ← categorised, lending rules kept intact        │
//! │       │                                                                 │
//! │       ├── inside issue/return: storage errors → TransactionAborted     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError::kind() → ErrorKind (what the presentation layer branches on) │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use libris_core::{CoreError, Entity, ErrorKind, ValidationError};
use thiserror::Error;

/// SQLite primary result codes that mean "someone else holds the lock".
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// A lending rule or validation failure.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Row lookup returned nothing.
    ///
    /// Repositories translate this into `CoreError::NotFound` whenever they
    /// know which entity was being looked up.
    #[error("Record not found")]
    RowNotFound,

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Registering an existing student_id
    /// - Adding a book with an ISBN already in the catalog
    /// - Registering an existing admin username
    #[error("Duplicate value: {constraint}")]
    UniqueViolation { constraint: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Deleting a book that loans still reference
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (copy counts, fine, loan status shape).
    #[error("Check constraint failed: {message}")]
    CheckViolation { message: String },

    /// The database is locked by another writer and the busy timeout expired.
    #[error("Database busy: {0}")]
    Busy(String),

    /// An issue or return transaction was rolled back. Nothing was written.
    #[error("{operation} aborted: {reason}")]
    TransactionAborted {
        operation: &'static str,
        reason: String,
    },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
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
    /// Shorthand for a `CoreError::NotFound` wrapped as a `DbError`.
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        DbError::Domain(CoreError::not_found(entity, id))
    }

    /// Returns the caller-facing category.
    ///
    /// ```text
    /// Domain(e)                         → e.kind()
    /// RowNotFound                       → NotFound
    /// Unique / ForeignKey / Check       → ConstraintViolation
    /// Busy / TransactionAborted         → TransactionAborted
    /// everything else                   → Storage
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Domain(err) => err.kind(),
            DbError::RowNotFound => ErrorKind::NotFound,
            DbError::UniqueViolation { .. }
            | DbError::ForeignKeyViolation { .. }
            | DbError::CheckViolation { .. } => ErrorKind::ConstraintViolation,
            DbError::Busy(_) | DbError::TransactionAborted { .. } => {
                ErrorKind::TransactionAborted
            }
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ErrorKind::Storage,
        }
    }

    /// Whether the operation can be resubmitted as-is.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Lending rule violations pass through untouched; anything the store
    /// raised mid-transaction becomes `TransactionAborted`.
    pub(crate) fn into_aborted(self, operation: &'static str) -> Self {
        match self {
            DbError::Domain(_) | DbError::TransactionAborted { .. } => self,
            other => DbError::TransactionAborted {
                operation,
                reason: other.to_string(),
            },
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::RowNotFound
/// sqlx::Error::Database       → constraint kind, or Busy for SQLITE_BUSY/LOCKED
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::RowNotFound,

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();

                if db_err.is_unique_violation() {
                    return DbError::UniqueViolation {
                        constraint: message
                            .strip_prefix("UNIQUE constraint failed: ")
                            .unwrap_or(&message)
                            .to_string(),
                    };
                }
                if db_err.is_foreign_key_violation() {
                    return DbError::ForeignKeyViolation { message };
                }
                if db_err.is_check_violation() {
                    return DbError::CheckViolation { message };
                }

                // Extended codes carry the primary code in the low byte.
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i64>().ok())
                    .map(|code| code & 0xff);
                match primary {
                    Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => DbError::Busy(message),
                    _ => DbError::QueryFailed(message),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            DbError::not_found(Entity::Book, 9).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            DbError::UniqueViolation {
                constraint: "students.student_id".to_string()
            }
            .kind(),
            ErrorKind::ConstraintViolation
        );
        assert_eq!(DbError::Busy("locked".to_string()).kind(), ErrorKind::TransactionAborted);
        assert_eq!(DbError::PoolExhausted.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_into_aborted_keeps_lending_rules() {
        let out_of_stock = DbError::Domain(CoreError::OutOfStock {
            book_id: 1,
            total_copies: 2,
        })
        .into_aborted("issue_book");
        assert_eq!(out_of_stock.kind(), ErrorKind::OutOfStock);

        let aborted = DbError::QueryFailed("induced failure".to_string()).into_aborted("issue_book");
        assert!(aborted.is_retryable());
        assert_eq!(aborted.to_string(), "issue_book aborted: Query failed: induced failure");
    }
}

//! # Error Types
//!
//! Domain-specific error types for libris-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  libris-core errors (this file)                                        │
//! │  ├── CoreError        - Lending rule violations                        │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - The category a caller branches on              │
//! │                                                                         │
//! │  libris-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → presentation layer      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Retry Rules
//! Only [`ErrorKind::TransactionAborted`] may be retried as-is. Every other
//! kind means the caller has to re-check its inputs first.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Entity
// =============================================================================

/// The record type an identifier failed to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Book,
    Student,
    Admin,
    Loan,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Book => "Book",
            Entity::Student => "Student",
            Entity::Admin => "Admin",
            Entity::Loan => "Loan",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse error category exposed to callers.
///
/// ```text
/// NotFound            identifier does not resolve
/// OutOfStock          issue attempted with zero available copies
/// AlreadyReturned     return attempted on a closed loan
/// ConstraintViolation store rejected the write (duplicate id, FK, CHECK)
/// TransactionAborted  nothing was written, safe to retry
/// InvalidInput        request rejected before touching the store
/// Storage             connection / migration / unexpected store failure
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    OutOfStock,
    AlreadyReturned,
    ConstraintViolation,
    TransactionAborted,
    InvalidInput,
    Storage,
}

impl ErrorKind {
    /// Whether the failed operation can be resubmitted without re-validating.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransactionAborted)
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Lending rule violations.
///
/// These are raised before any write happens, or cause the surrounding
/// transaction to roll back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier does not resolve.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// Every copy of the title is out on loan.
    ///
    /// ## User Workflow
    /// ```text
    /// Issue book 7 to S003
    ///      │
    ///      ▼
    /// Check copies: available=0, total=2
    ///      │
    ///      ▼
    /// OutOfStock { book_id: 7, total_copies: 2 }
    ///      │
    ///      ▼
    /// UI shows: "All 2 copies are on loan"
    /// ```
    #[error("Book {book_id} is out of stock: all {total_copies} copies are on loan")]
    OutOfStock { book_id: i64, total_copies: i64 },

    /// The loan is already closed. Returning twice is caller misuse.
    #[error("Loan {loan_id} was already returned on {returned_on}")]
    AlreadyReturned { loan_id: i64, returned_on: NaiveDate },

    /// Return date falls before the issue date.
    #[error("Loan {loan_id} was issued on {issue_date}, cannot be returned on {return_date}")]
    InvalidReturnDate {
        loan_id: i64,
        issue_date: NaiveDate,
        return_date: NaiveDate,
    },

    /// A book's copy counts disagree with its open loans.
    #[error(
        "Copy count mismatch for book {book_id}: total {total_copies}, available {available_copies}, open loans {open_loans}"
    )]
    CopyCountMismatch {
        book_id: i64,
        total_copies: i64,
        available_copies: i64,
        open_loans: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity and identifier.
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the caller-facing category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::OutOfStock { .. } => ErrorKind::OutOfStock,
            CoreError::AlreadyReturned { .. } => ErrorKind::AlreadyReturned,
            CoreError::InvalidReturnDate { .. } | CoreError::Validation(_) => {
                ErrorKind::InvalidInput
            }
            CoreError::CopyCountMismatch { .. } => ErrorKind::ConstraintViolation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store access.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., malformed ISBN).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

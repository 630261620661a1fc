//! # Copy Count Invariant
//!
//! For every book, at every committed state:
//!
//! ```text
//! 0 <= available_copies <= total_copies
//! available_copies + open_loans(book) == total_copies
//! ```
//!
//! The store enforces the first line with CHECK constraints. The second line
//! spans two tables, so it is verified here against counts the caller reads.

use crate::error::{CoreError, CoreResult};
use crate::types::{Book, CopyCountDiscrepancy};

/// Verifies one book's counters against its number of open loans.
///
/// ```rust
/// use libris_core::invariants::check_copy_counts;
///
/// assert!(check_copy_counts(7, 2, 1, 1).is_ok());
/// assert!(check_copy_counts(7, 2, 2, 1).is_err());
/// ```
pub fn check_copy_counts(
    book_id: i64,
    total_copies: i64,
    available_copies: i64,
    open_loans: i64,
) -> CoreResult<()> {
    let in_range = (0..=total_copies).contains(&available_copies);
    if in_range && available_copies + open_loans == total_copies {
        return Ok(());
    }

    Err(CoreError::CopyCountMismatch {
        book_id,
        total_copies,
        available_copies,
        open_loans,
    })
}

/// [`check_copy_counts`] for a loaded book.
pub fn check_book(book: &Book, open_loans: i64) -> CoreResult<()> {
    check_copy_counts(
        book.book_id,
        book.total_copies,
        book.available_copies,
        open_loans,
    )
}

impl CopyCountDiscrepancy {
    /// Re-raises an audit finding as an error.
    pub fn into_error(self) -> CoreError {
        CoreError::CopyCountMismatch {
            book_id: self.book_id,
            total_copies: self.total_copies,
            available_copies: self.available_copies,
            open_loans: self.open_loans,
        }
    }
}

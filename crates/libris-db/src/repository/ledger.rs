//! # Loan Ledger
//!
//! The append-only record of loans and the Open → Returned state machine.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock_open()      UPDATE ... SET status = status (takes write lock)     │
//! │  create()         INSERT ... status='open'                              │
//! │  mark_returned()  UPDATE ... WHERE loan_id = ? AND status = 'open'      │
//! │                                                                         │
//! │  Both take a &mut SqliteConnection: they only ever run inside a        │
//! │  LoanService transaction, next to the matching copy-count update.      │
//! │  The public LoanLedger handle is read-only.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Referential checks (book and student exist) are the caller's job; the
//! foreign keys are a backstop.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use libris_core::{CoreError, Entity, Loan, LoanStatus, Money, NewLoan};

const LOAN_COLUMNS: &str =
    "loan_id, book_id, student_id, issue_date, due_date, return_date, fine_cents, status";

/// Read-only access to the ledger.
#[derive(Debug, Clone)]
pub struct LoanLedger {
    pool: SqlitePool,
}

impl LoanLedger {
    /// Creates a new LoanLedger.
    pub fn new(pool: SqlitePool) -> Self {
        LoanLedger { pool }
    }

    /// Gets a loan by ID.
    ///
    /// ## Errors
    /// - `NotFound(Loan)` if the ID does not resolve
    pub async fn get(&self, loan_id: i64) -> DbResult<Loan> {
        let mut conn = self.pool.acquire().await?;
        fetch_loan(&mut conn, loan_id)
            .await?
            .ok_or_else(|| DbError::not_found(Entity::Loan, loan_id))
    }

    /// Every open loan, oldest first.
    pub async fn list_open(&self) -> DbResult<Vec<Loan>> {
        let sql = format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE status = 'open' ORDER BY loan_id"
        );
        let loans: Vec<Loan> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        debug!(count = loans.len(), "Listed open loans");
        Ok(loans)
    }

    /// Every loan of one student, open or returned, oldest first.
    ///
    /// An unknown student simply has no loans.
    pub async fn list_by_student(&self, student_id: &str) -> DbResult<Vec<Loan>> {
        let sql = format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE student_id = ?1 ORDER BY loan_id"
        );
        let loans: Vec<Loan> = sqlx::query_as(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(student_id = %student_id, count = loans.len(), "Listed student loans");
        Ok(loans)
    }

    /// Open loans whose due date precedes `as_of`, earliest due first.
    pub async fn list_overdue(&self, as_of: NaiveDate) -> DbResult<Vec<Loan>> {
        let sql = format!(
            r#"
            SELECT {LOAN_COLUMNS} FROM loans
            WHERE status = 'open' AND due_date < ?1
            ORDER BY due_date, loan_id
            "#
        );
        let loans: Vec<Loan> = sqlx::query_as(&sql)
            .bind(as_of)
            .fetch_all(&self.pool)
            .await?;

        debug!(%as_of, count = loans.len(), "Listed overdue loans");
        Ok(loans)
    }
}

// =============================================================================
// Connection-Level Operations
// =============================================================================

pub(crate) async fn fetch_loan(
    conn: &mut SqliteConnection,
    loan_id: i64,
) -> DbResult<Option<Loan>> {
    let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE loan_id = ?1");
    let loan = sqlx::query_as(&sql)
        .bind(loan_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(loan)
}

/// Claims SQLite's write lock for a return by touching the loan row while it
/// is still open. `false` if no open loan has this ID (the row is untouched).
///
/// Runs as the first statement of the return transaction, so a concurrent
/// writer waits on the busy timeout before taking its snapshot instead of
/// failing on a stale one.
pub(crate) async fn lock_open(conn: &mut SqliteConnection, loan_id: i64) -> DbResult<bool> {
    let result = sqlx::query("UPDATE loans SET status = status WHERE loan_id = ?1 AND status = 'open'")
        .bind(loan_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Appends an open loan.
pub(crate) async fn create(conn: &mut SqliteConnection, loan: &NewLoan) -> DbResult<Loan> {
    let sql = format!(
        r#"
        INSERT INTO loans (book_id, student_id, issue_date, due_date, status)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING {LOAN_COLUMNS}
        "#
    );
    let created: Loan = sqlx::query_as(&sql)
        .bind(loan.book_id)
        .bind(&loan.student_id)
        .bind(loan.issue_date)
        .bind(loan.due_date)
        .bind(LoanStatus::Open)
        .fetch_one(&mut *conn)
        .await?;

    debug!(loan_id = created.loan_id, book_id = created.book_id, "Loan appended");
    Ok(created)
}

/// Open → Returned, recording the return date and fine.
///
/// ## Errors
/// - `NotFound(Loan)` if the ID does not resolve
/// - `AlreadyReturned` if the loan is closed
pub(crate) async fn mark_returned(
    conn: &mut SqliteConnection,
    loan_id: i64,
    return_date: NaiveDate,
    fine: Money,
) -> DbResult<Loan> {
    let sql = format!(
        r#"
        UPDATE loans
        SET status = ?2, return_date = ?3, fine_cents = ?4
        WHERE loan_id = ?1 AND status = 'open'
        RETURNING {LOAN_COLUMNS}
        "#
    );
    let updated: Option<Loan> = sqlx::query_as(&sql)
        .bind(loan_id)
        .bind(LoanStatus::Returned)
        .bind(return_date)
        .bind(fine.cents())
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(loan) = updated {
        return Ok(loan);
    }

    // Nothing matched: either no such loan or it is already closed.
    match fetch_loan(conn, loan_id).await? {
        Some(existing) => Err(CoreError::AlreadyReturned {
            loan_id,
            returned_on: existing.return_date.unwrap_or(return_date),
        }
        .into()),
        None => Err(DbError::not_found(Entity::Loan, loan_id)),
    }
}

/// Number of open loans of one book.
pub(crate) async fn count_open_for_book(
    conn: &mut SqliteConnection,
    book_id: i64,
) -> DbResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE book_id = ?1 AND status = 'open'")
            .bind(book_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{date, new_book, new_student, test_db};
    use libris_core::ErrorKind;

    async fn seeded() -> (crate::Database, i64) {
        let db = test_db().await;
        let book = db.catalog().add(&new_book("Dune", 3)).await.unwrap();
        db.students().add(&new_student("S1")).await.unwrap();
        db.students().add(&new_student("S2")).await.unwrap();
        (db, book.book_id)
    }

    fn loan(book_id: i64, student_id: &str, issued: NaiveDate, due: NaiveDate) -> NewLoan {
        NewLoan {
            book_id,
            student_id: student_id.to_string(),
            issue_date: issued,
            due_date: due,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let (db, book_id) = seeded().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let first = create(&mut conn, &loan(book_id, "S1", date(2024, 1, 1), date(2024, 1, 15)))
            .await
            .unwrap();
        // Same pair again is a separate loan.
        let second = create(&mut conn, &loan(book_id, "S1", date(2024, 1, 2), date(2024, 1, 16)))
            .await
            .unwrap();
        drop(conn);

        assert!(second.loan_id > first.loan_id);
        assert_eq!(first.status, LoanStatus::Open);
        assert_eq!(first.return_date, None);
        assert_eq!(first.fine_cents, 0);

        let ledger = db.loans();
        assert_eq!(ledger.get(first.loan_id).await.unwrap(), first);
        assert_eq!(ledger.list_open().await.unwrap(), vec![first, second]);
        assert!(ledger.list_by_student("S2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_returned_once() {
        let (db, book_id) = seeded().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let open = create(&mut conn, &loan(book_id, "S1", date(2024, 1, 1), date(2024, 1, 15)))
            .await
            .unwrap();

        let closed = mark_returned(&mut conn, open.loan_id, date(2024, 1, 20), Money::from_cents(2500))
            .await
            .unwrap();
        assert_eq!(closed.status, LoanStatus::Returned);
        assert_eq!(closed.return_date, Some(date(2024, 1, 20)));
        assert_eq!(closed.fine_cents, 2500);

        let err = mark_returned(&mut conn, open.loan_id, date(2024, 1, 21), Money::zero())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyReturned);

        let err = mark_returned(&mut conn, 999, date(2024, 1, 21), Money::zero())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Still the first return.
        let stored = fetch_loan(&mut conn, open.loan_id).await.unwrap().unwrap();
        assert_eq!(stored, closed);
    }

    #[tokio::test]
    async fn test_lock_open_leaves_loan_unchanged() {
        let (db, book_id) = seeded().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let open = create(&mut conn, &loan(book_id, "S1", date(2024, 1, 1), date(2024, 1, 15)))
            .await
            .unwrap();

        assert!(lock_open(&mut conn, open.loan_id).await.unwrap());
        assert_eq!(fetch_loan(&mut conn, open.loan_id).await.unwrap(), Some(open.clone()));

        mark_returned(&mut conn, open.loan_id, date(2024, 1, 10), Money::zero())
            .await
            .unwrap();
        // Returned loans are skipped rather than tripping the frozen-row trigger.
        assert!(!lock_open(&mut conn, open.loan_id).await.unwrap());
        assert!(!lock_open(&mut conn, 999).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_overdue_excludes_due_date_itself() {
        let (db, book_id) = seeded().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let l1 = create(&mut conn, &loan(book_id, "S1", date(2024, 1, 1), date(2024, 1, 15)))
            .await
            .unwrap();
        let l2 = create(&mut conn, &loan(book_id, "S2", date(2024, 1, 2), date(2024, 1, 16)))
            .await
            .unwrap();
        mark_returned(&mut conn, l1.loan_id, date(2024, 1, 20), Money::from_cents(2500))
            .await
            .unwrap();
        assert_eq!(count_open_for_book(&mut conn, book_id).await.unwrap(), 1);
        drop(conn);

        let ledger = db.loans();
        assert!(ledger.list_overdue(date(2024, 1, 16)).await.unwrap().is_empty());
        let overdue = ledger.list_overdue(date(2024, 1, 17)).await.unwrap();
        assert_eq!(overdue.iter().map(|l| l.loan_id).collect::<Vec<_>>(), vec![l2.loan_id]);
    }

    #[tokio::test]
    async fn test_returned_loans_are_frozen_in_storage() {
        let (db, book_id) = seeded().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let open = create(&mut conn, &loan(book_id, "S1", date(2024, 1, 1), date(2024, 1, 15)))
            .await
            .unwrap();
        mark_returned(&mut conn, open.loan_id, date(2024, 1, 10), Money::zero())
            .await
            .unwrap();

        let tampered = sqlx::query("UPDATE loans SET fine_cents = 0, status = 'open', return_date = NULL WHERE loan_id = ?1")
            .bind(open.loan_id)
            .execute(&mut *conn)
            .await;
        assert!(tampered.is_err());

        let deleted = sqlx::query("DELETE FROM loans WHERE loan_id = ?1")
            .bind(open.loan_id)
            .execute(&mut *conn)
            .await;
        assert!(deleted.is_err());
    }
}

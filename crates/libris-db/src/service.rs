//! # Loan Service
//!
//! Issue and return, the only two operations that move copies.
//!
//! ## Issue
//! ```text
//! BEGIN
//!   UPDATE books SET available -= 1 WHERE book_id = ? AND available > 0
//!     │
//!     ├── 0 rows, no such book      → NotFound(Book)      ROLLBACK
//!     ├── 0 rows, book exists       → OutOfStock          ROLLBACK
//!     ▼
//!   SELECT student                  → NotFound(Student)   ROLLBACK
//!     ▼
//!   INSERT loan (open, due = issue + period)
//! COMMIT
//! ```
//!
//! Both transactions open with a write so they take the write lock before
//! reading anything. A concurrent writer waits on the lock (up to the busy
//! timeout) and then reads the committed state: a second issuer of the last
//! copy sees zero copies, a second returner of the same loan sees it closed,
//! and returns of different loans simply run one after another.
//!
//! ## Return
//! ```text
//! BEGIN
//!   UPDATE loans SET status = status WHERE loan_id = ? AND status = 'open'
//!   SELECT loan                     → NotFound(Loan)
//!   settle(return_date, rate)       → AlreadyReturned / InvalidReturnDate
//!   UPDATE loans ... WHERE status = 'open'
//!   UPDATE books SET available += 1 WHERE available < total
//!     └── 0 rows                    → CopyCountMismatch   ROLLBACK
//! COMMIT
//! ```
//!
//! Any storage failure between BEGIN and COMMIT rolls everything back and
//! surfaces as `TransactionAborted`.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use mockable::Clock;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{catalog, ledger, membership};
use crate::views::LoanViews;
use libris_core::policy::{self, LoanPolicy};
use libris_core::validation::{validate_daily_fine, validate_loan_period_days};
use libris_core::{CoreError, Entity, Loan, LoanDetail, Money, NewLoan, ReturnReceipt};

const ISSUE: &str = "issue_book";
const RETURN: &str = "return_book";

/// Clock shared by the service and its callers.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Transactional issue / return.
///
/// ## Usage
/// ```rust,ignore
/// let lending = db.lending(Arc::new(DefaultClock), LoanPolicy::default());
///
/// let loan = lending.issue_book_today(7, "S001").await?;
/// let receipt = lending.return_book_today(loan.loan_id).await?;
/// println!("fine: {}", receipt.fine);
/// ```
#[derive(Clone)]
pub struct LoanService {
    pool: SqlitePool,
    clock: SharedClock,
    policy: LoanPolicy,
}

impl fmt::Debug for LoanService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoanService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl LoanService {
    pub fn new(pool: SqlitePool, clock: SharedClock, policy: LoanPolicy) -> Self {
        LoanService {
            pool,
            clock,
            policy,
        }
    }

    /// The configured lending terms.
    pub fn policy(&self) -> LoanPolicy {
        self.policy
    }

    /// Today's date according to the injected clock, in local time.
    pub fn today(&self) -> NaiveDate {
        self.clock.local().date_naive()
    }

    /// Issues one copy of `book_id` to `student_id`.
    ///
    /// ## Errors (first failure wins)
    /// 1. `NotFound(Book)`
    /// 2. `OutOfStock`
    /// 3. `NotFound(Student)`
    ///
    /// Storage failures yield `TransactionAborted`; nothing is written.
    pub async fn issue_book(
        &self,
        book_id: i64,
        student_id: &str,
        issue_date: NaiveDate,
        loan_period_days: u32,
    ) -> DbResult<Loan> {
        validate_loan_period_days(loan_period_days)?;
        let due_date = policy::due_date(issue_date, loan_period_days)?;
        let new_loan = NewLoan {
            book_id,
            student_id: student_id.to_string(),
            issue_date,
            due_date,
        };

        let mut tx = self.begin(ISSUE).await?;
        match issue_in(&mut tx, &new_loan).await {
            Ok(loan) => {
                commit(tx, ISSUE).await?;
                info!(
                    loan_id = loan.loan_id,
                    book_id,
                    student_id = %loan.student_id,
                    %due_date,
                    "Book issued"
                );
                Ok(loan)
            }
            Err(err) => {
                rollback(tx, ISSUE).await;
                Err(err.into_aborted(ISSUE))
            }
        }
    }

    /// [`issue_book`](Self::issue_book) dated today with the configured loan period.
    pub async fn issue_book_today(&self, book_id: i64, student_id: &str) -> DbResult<Loan> {
        self.issue_book(book_id, student_id, self.today(), self.policy.loan_period_days)
            .await
    }

    /// Closes a loan and puts its copy back on the shelf.
    ///
    /// The fine is `max(0, return_date - due_date) × daily_fine_rate`.
    ///
    /// ## Errors
    /// - `NotFound(Loan)`
    /// - `AlreadyReturned` (no state change)
    /// - `InvalidReturnDate` if `return_date` precedes the issue date
    /// - `CopyCountMismatch` if the book's shelf is already full
    pub async fn return_book(
        &self,
        loan_id: i64,
        return_date: NaiveDate,
        daily_fine_rate: Money,
    ) -> DbResult<ReturnReceipt> {
        validate_daily_fine(daily_fine_rate)?;

        let mut tx = self.begin(RETURN).await?;
        match return_in(&mut tx, loan_id, return_date, daily_fine_rate).await {
            Ok(receipt) => {
                commit(tx, RETURN).await?;
                if receipt.days_overdue > 0 {
                    warn!(
                        loan_id,
                        student_id = %receipt.loan.student_id,
                        days_overdue = receipt.days_overdue,
                        fine = %receipt.fine,
                        "Overdue book returned"
                    );
                }
                info!(
                    loan_id,
                    book_id = receipt.loan.book_id,
                    %return_date,
                    fine_cents = receipt.fine.cents(),
                    "Book returned"
                );
                Ok(receipt)
            }
            Err(err) => {
                rollback(tx, RETURN).await;
                Err(err.into_aborted(RETURN))
            }
        }
    }

    /// [`return_book`](Self::return_book) dated today with the configured fine rate.
    pub async fn return_book_today(&self, loan_id: i64) -> DbResult<ReturnReceipt> {
        self.return_book(loan_id, self.today(), self.policy.daily_fine)
            .await
    }

    /// Open loans overdue as of the clock's today.
    pub async fn overdue_as_of_today(&self) -> DbResult<Vec<LoanDetail>> {
        LoanViews::new(self.pool.clone())
            .list_overdue_loans(self.today())
            .await
    }

    async fn begin(&self, operation: &'static str) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::from(e).into_aborted(operation))
    }
}

async fn commit(tx: Transaction<'static, Sqlite>, operation: &'static str) -> DbResult<()> {
    tx.commit()
        .await
        .map_err(|e| DbError::from(e).into_aborted(operation))
}

async fn rollback(tx: Transaction<'static, Sqlite>, operation: &'static str) {
    if let Err(e) = tx.rollback().await {
        warn!(operation, error = %e, "Rollback failed");
    }
}

async fn issue_in(conn: &mut SqliteConnection, new_loan: &NewLoan) -> DbResult<Loan> {
    let book_id = new_loan.book_id;

    if !catalog::take_copy(conn, book_id).await? {
        return Err(match catalog::fetch_book(conn, book_id).await? {
            Some(book) => CoreError::OutOfStock {
                book_id,
                total_copies: book.total_copies,
            }
            .into(),
            None => DbError::not_found(Entity::Book, book_id),
        });
    }

    if membership::fetch_student(conn, &new_loan.student_id)
        .await?
        .is_none()
    {
        return Err(DbError::not_found(Entity::Student, &new_loan.student_id));
    }

    ledger::create(conn, new_loan).await
}

async fn return_in(
    conn: &mut SqliteConnection,
    loan_id: i64,
    return_date: NaiveDate,
    daily_fine_rate: Money,
) -> DbResult<ReturnReceipt> {
    // Missing and closed loans fall through to the checks below.
    ledger::lock_open(conn, loan_id).await?;

    let loan = ledger::fetch_loan(conn, loan_id)
        .await?
        .ok_or_else(|| DbError::not_found(Entity::Loan, loan_id))?;

    let fine = loan.settle(return_date, daily_fine_rate)?;
    let returned = ledger::mark_returned(conn, loan_id, return_date, fine).await?;

    if !catalog::restore_copy(conn, loan.book_id).await? {
        let book = catalog::fetch_book(conn, loan.book_id)
            .await?
            .ok_or_else(|| DbError::not_found(Entity::Book, loan.book_id))?;
        // Count before this return closed the loan.
        let open_loans = ledger::count_open_for_book(conn, loan.book_id).await? + 1;
        return Err(CoreError::CopyCountMismatch {
            book_id: book.book_id,
            total_copies: book.total_copies,
            available_copies: book.available_copies,
            open_loans,
        }
        .into());
    }

    Ok(ReturnReceipt {
        days_overdue: policy::days_overdue(loan.due_date, return_date),
        loan: returned,
        fine,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        date, file_db, lending, new_book, new_student, remove_file_db, test_db,
    };
    use crate::Database;
    use libris_core::invariants::check_book;
    use libris_core::{BookFilter, ErrorKind, LoanStatus};

    /// Book 1 with two copies, students S1..S3.
    async fn scenario_db() -> (Database, i64) {
        let db = test_db().await;
        let book = db.catalog().add(&new_book("Dune", 2)).await.unwrap();
        for id in ["S1", "S2", "S3"] {
            db.students().add(&new_student(id)).await.unwrap();
        }
        (db, book.book_id)
    }

    async fn available(db: &Database, book_id: i64) -> i64 {
        db.catalog().get(book_id).await.unwrap().available_copies
    }

    async fn assert_copy_counts_balanced(db: &Database) {
        db.views().verify_copy_counts().await.unwrap();
        for book in db.catalog().list(&BookFilter::all(100)).await.unwrap() {
            let open = db
                .loans()
                .list_open()
                .await
                .unwrap()
                .iter()
                .filter(|l| l.book_id == book.book_id)
                .count();
            check_book(&book, open as i64).unwrap();
        }
    }

    #[tokio::test]
    async fn test_issue_until_out_of_stock() {
        let (db, book_id) = scenario_db().await;
        let (service, _) = lending(&db, date(2024, 1, 1));

        let l1 = service
            .issue_book(book_id, "S1", date(2024, 1, 1), 14)
            .await
            .unwrap();
        assert_eq!(l1.due_date, date(2024, 1, 15));
        assert_eq!(l1.status, LoanStatus::Open);
        assert_eq!(available(&db, book_id).await, 1);

        let l2 = service
            .issue_book(book_id, "S2", date(2024, 1, 2), 14)
            .await
            .unwrap();
        assert_eq!(l2.due_date, date(2024, 1, 16));
        assert_eq!(available(&db, book_id).await, 0);

        let err = service
            .issue_book(book_id, "S3", date(2024, 1, 3), 14)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfStock);
        assert_eq!(available(&db, book_id).await, 0);
        assert_eq!(db.loans().list_open().await.unwrap().len(), 2);
        assert_copy_counts_balanced(&db).await;
    }

    #[tokio::test]
    async fn test_return_with_fine() {
        let (db, book_id) = scenario_db().await;
        let (service, _) = lending(&db, date(2024, 1, 1));
        let l1 = service
            .issue_book(book_id, "S1", date(2024, 1, 1), 14)
            .await
            .unwrap();
        let l2 = service
            .issue_book(book_id, "S2", date(2024, 1, 2), 14)
            .await
            .unwrap();

        let receipt = service
            .return_book(l1.loan_id, date(2024, 1, 20), Money::from_cents(500))
            .await
            .unwrap();
        assert_eq!(receipt.fine.cents(), 2500);
        assert_eq!(receipt.days_overdue, 5);
        assert_eq!(receipt.loan.status, LoanStatus::Returned);
        assert_eq!(receipt.loan.return_date, Some(date(2024, 1, 20)));
        assert_eq!(receipt.loan.fine_cents, 2500);
        assert_eq!(available(&db, book_id).await, 1);

        let overdue = db.loans().list_overdue(date(2024, 1, 17)).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].loan_id, l2.loan_id);
        assert_copy_counts_balanced(&db).await;
    }

    #[tokio::test]
    async fn test_fine_boundary() {
        let (db, book_id) = scenario_db().await;
        let (service, _) = lending(&db, date(2024, 1, 1));
        let l1 = service
            .issue_book(book_id, "S1", date(2024, 1, 1), 14)
            .await
            .unwrap();
        let l2 = service
            .issue_book(book_id, "S2", date(2024, 1, 1), 14)
            .await
            .unwrap();
        let rate = Money::from_cents(500);

        let on_due = service.return_book(l1.loan_id, l1.due_date, rate).await.unwrap();
        assert!(on_due.fine.is_zero());
        assert_eq!(on_due.days_overdue, 0);

        let day_late = service
            .return_book(l2.loan_id, date(2024, 1, 16), rate)
            .await
            .unwrap();
        assert_eq!(day_late.fine, rate);
    }

    #[tokio::test]
    async fn test_issue_precondition_order() {
        let (db, book_id) = scenario_db().await;
        let (service, _) = lending(&db, date(2024, 1, 1));

        let err = service
            .issue_book(999, "nobody", date(2024, 1, 1), 14)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NotFound { entity: Entity::Book, .. })
        ));

        let err = service
            .issue_book(book_id, "nobody", date(2024, 1, 1), 14)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NotFound { entity: Entity::Student, .. })
        ));
        // The decrement was rolled back.
        assert_eq!(available(&db, book_id).await, 2);

        service.issue_book(book_id, "S1", date(2024, 1, 1), 14).await.unwrap();
        service.issue_book(book_id, "S2", date(2024, 1, 1), 14).await.unwrap();

        // Out of stock is reported before the unknown student.
        let err = service
            .issue_book(book_id, "nobody", date(2024, 1, 1), 14)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfStock);
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_period() {
        let (db, book_id) = scenario_db().await;
        let (service, _) = lending(&db, date(2024, 1, 1));

        let err = service
            .issue_book(book_id, "S1", date(2024, 1, 1), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(available(&db, book_id).await, 2);
    }

    #[tokio::test]
    async fn test_return_twice_is_rejected_without_change() {
        let (db, book_id) = scenario_db().await;
        let (service, _) = lending(&db, date(2024, 1, 1));
        let loan = service
            .issue_book(book_id, "S1", date(2024, 1, 1), 14)
            .await
            .unwrap();
        let first = service
            .return_book(loan.loan_id, date(2024, 1, 18), Money::from_cents(500))
            .await
            .unwrap();

        let err = service
            .return_book(loan.loan_id, date(2024, 1, 30), Money::from_cents(500))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyReturned);
        assert!(!err.is_retryable());

        assert_eq!(db.loans().get(loan.loan_id).await.unwrap(), first.loan);
        assert_eq!(available(&db, book_id).await, 2);
    }

    #[tokio::test]
    async fn test_return_errors() {
        let (db, book_id) = scenario_db().await;
        let (service, _) = lending(&db, date(2024, 1, 5));

        let err = service
            .return_book(404, date(2024, 1, 5), Money::from_cents(500))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let loan = service
            .issue_book(book_id, "S1", date(2024, 1, 5), 14)
            .await
            .unwrap();
        let err = service
            .return_book(loan.loan_id, date(2024, 1, 4), Money::from_cents(500))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidReturnDate { .. })));

        let err = service
            .return_book(loan.loan_id, date(2024, 1, 6), Money::from_cents(-5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(db.loans().get(loan.loan_id).await.unwrap().is_open());
    }

    #[tokio::test]
    async fn test_issue_is_atomic_under_induced_failure() {
        let (db, book_id) = scenario_db().await;
        sqlx::query(
            "CREATE TRIGGER fail_loan_insert BEFORE INSERT ON loans \
             BEGIN SELECT RAISE(ABORT, 'induced failure'); END;",
        )
        .execute(db.pool())
        .await
        .unwrap();
        let (service, _) = lending(&db, date(2024, 1, 1));

        let err = service
            .issue_book(book_id, "S1", date(2024, 1, 1), 14)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::TransactionAborted { operation: "issue_book", .. }));
        assert!(err.is_retryable());

        assert_eq!(available(&db, book_id).await, 2);
        assert!(db.loans().list_open().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_return_is_atomic_under_induced_failure() {
        let (db, book_id) = scenario_db().await;
        let (service, _) = lending(&db, date(2024, 1, 1));
        let loan = service
            .issue_book(book_id, "S1", date(2024, 1, 1), 14)
            .await
            .unwrap();

        sqlx::query(
            "CREATE TRIGGER fail_copy_update BEFORE UPDATE ON books \
             BEGIN SELECT RAISE(ABORT, 'induced failure'); END;",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = service
            .return_book(loan.loan_id, date(2024, 1, 20), Money::from_cents(500))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionAborted);

        let stored = db.loans().get(loan.loan_id).await.unwrap();
        assert_eq!(stored, loan);
        assert_eq!(available(&db, book_id).await, 1);
    }

    #[tokio::test]
    async fn test_return_with_full_shelf_reports_mismatch() {
        let (db, book_id) = scenario_db().await;
        let (service, _) = lending(&db, date(2024, 1, 1));
        let loan = service
            .issue_book(book_id, "S1", date(2024, 1, 1), 14)
            .await
            .unwrap();

        // Corrupt the counter behind the service's back.
        sqlx::query("UPDATE books SET available_copies = total_copies WHERE book_id = ?1")
            .bind(book_id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = service
            .return_book(loan.loan_id, date(2024, 1, 10), Money::from_cents(500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CopyCountMismatch { open_loans: 1, available_copies: 2, .. })
        ));
        assert!(db.loans().get(loan.loan_id).await.unwrap().is_open());
    }

    #[tokio::test]
    async fn test_clock_driven_operations() {
        let (db, book_id) = scenario_db().await;
        let (service, clock) = lending(&db, date(2024, 3, 1));
        assert_eq!(service.today(), date(2024, 3, 1));

        let loan = service.issue_book_today(book_id, "S1").await.unwrap();
        assert_eq!(loan.issue_date, date(2024, 3, 1));
        assert_eq!(loan.due_date, date(2024, 3, 15));

        clock.set(date(2024, 3, 18));
        let overdue = service.overdue_as_of_today().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].loan_id, loan.loan_id);

        let receipt = service.return_book_today(loan.loan_id).await.unwrap();
        assert_eq!(receipt.loan.return_date, Some(date(2024, 3, 18)));
        assert_eq!(receipt.fine.cents(), 1500);
        assert!(service.overdue_as_of_today().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_issue_of_last_copy() {
        let (db, path) = file_db(4).await;
        let book = db.catalog().add(&new_book("Dune", 1)).await.unwrap();
        for id in ["S1", "S2", "S3", "S4"] {
            db.students().add(&new_student(id)).await.unwrap();
        }
        let (service, _) = lending(&db, date(2024, 1, 1));

        let handles: Vec<_> = ["S1", "S2", "S3", "S4"]
            .into_iter()
            .map(|student| {
                let service = service.clone();
                let book_id = book.book_id;
                tokio::spawn(async move {
                    service
                        .issue_book(book_id, student, date(2024, 1, 1), 14)
                        .await
                })
            })
            .collect();

        let mut issued = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => issued += 1,
                Err(err) => assert!(matches!(
                    err.kind(),
                    ErrorKind::OutOfStock | ErrorKind::TransactionAborted
                )),
            }
        }

        assert_eq!(issued, 1);
        assert_eq!(available(&db, book.book_id).await, 0);
        assert_eq!(db.loans().list_open().await.unwrap().len(), 1);
        assert_copy_counts_balanced(&db).await;

        db.close().await;
        remove_file_db(&path);
    }

    #[tokio::test]
    async fn test_concurrent_returns_of_distinct_loans_all_succeed() {
        let (db, path) = file_db(8).await;
        let (service, _) = lending(&db, date(2024, 1, 1));
        let mut loan_ids = Vec::new();
        for i in 0..8 {
            let book = db
                .catalog()
                .add(&new_book(&format!("Title {i}"), 1))
                .await
                .unwrap();
            let student = format!("S{i}");
            db.students().add(&new_student(&student)).await.unwrap();
            let loan = service
                .issue_book(book.book_id, &student, date(2024, 1, 1), 14)
                .await
                .unwrap();
            loan_ids.push(loan.loan_id);
        }

        let handles: Vec<_> = loan_ids
            .into_iter()
            .map(|loan_id| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .return_book(loan_id, date(2024, 1, 20), Money::from_cents(500))
                        .await
                })
            })
            .collect();

        for handle in handles {
            let receipt = handle.await.unwrap().unwrap();
            assert_eq!(receipt.fine.cents(), 2500);
        }

        assert!(db.loans().list_open().await.unwrap().is_empty());
        let summary = db.views().summary(date(2024, 1, 20)).await.unwrap();
        assert_eq!(summary.available_copies, 8);
        assert_copy_counts_balanced(&db).await;

        db.close().await;
        remove_file_db(&path);
    }

    #[tokio::test]
    async fn test_concurrent_returns_of_one_loan() {
        let (db, path) = file_db(4).await;
        let book = db.catalog().add(&new_book("Dune", 1)).await.unwrap();
        db.students().add(&new_student("S1")).await.unwrap();
        let (service, _) = lending(&db, date(2024, 1, 1));
        let loan = service
            .issue_book(book.book_id, "S1", date(2024, 1, 1), 14)
            .await
            .unwrap();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let service = service.clone();
                let loan_id = loan.loan_id;
                tokio::spawn(async move {
                    service
                        .return_book(loan_id, date(2024, 1, 10), Money::from_cents(500))
                        .await
                })
            })
            .collect();

        let mut returned = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => returned += 1,
                Err(err) => assert!(matches!(
                    err.kind(),
                    ErrorKind::AlreadyReturned | ErrorKind::TransactionAborted
                )),
            }
        }

        assert_eq!(returned, 1);
        assert_eq!(available(&db, book.book_id).await, 1);
        assert_copy_counts_balanced(&db).await;

        db.close().await;
        remove_file_db(&path);
    }
}

//! # Query Views
//!
//! Read-only projections over ledger, catalog and membership.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────────┐
//! │ View                 │ Rows                                             │
//! ├──────────────────────┼──────────────────────────────────────────────────┤
//! │ list_open_loans      │ every open loan, earliest due first              │
//! │ list_loans_by_student│ one student's history, oldest first              │
//! │ list_overdue_loans   │ open loans due before `as_of`                    │
//! │ student_loans        │ one student's loans with standing, by due date   │
//! │ recent_open_loans    │ newest open loans (admin dashboard)              │
//! │ summary              │ dashboard counters                               │
//! │ copy_count_discrep.  │ books whose counters disagree with the ledger    │
//! │ verify_copy_counts   │ the same audit as a CopyCountMismatch error      │
//! └──────────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! Overdue is never stored. Every view that classifies loans takes the
//! "as of" date from its caller.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbResult;
use libris_core::validation::validate_limit;
use libris_core::{CopyCountDiscrepancy, LibrarySummary, LoanDetail, StudentLoan};

const SELECT_DETAIL: &str = r#"
    SELECT l.loan_id, l.book_id, b.title, b.author,
           l.student_id, s.name AS student_name,
           l.issue_date, l.due_date, l.return_date, l.fine_cents, l.status
    FROM loans l
    JOIN books b    ON b.book_id = l.book_id
    JOIN students s ON s.student_id = l.student_id
"#;

/// Read-only query views.
#[derive(Debug, Clone)]
pub struct LoanViews {
    pool: SqlitePool,
}

impl LoanViews {
    /// Creates a new LoanViews.
    pub fn new(pool: SqlitePool) -> Self {
        LoanViews { pool }
    }

    /// Every open loan with its book and student, earliest due first.
    pub async fn list_open_loans(&self) -> DbResult<Vec<LoanDetail>> {
        let sql = format!("{SELECT_DETAIL} WHERE l.status = 'open' ORDER BY l.due_date, l.loan_id");
        let loans: Vec<LoanDetail> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        debug!(count = loans.len(), "Open loans view");
        Ok(loans)
    }

    /// One student's loans, open and returned, oldest first.
    pub async fn list_loans_by_student(&self, student_id: &str) -> DbResult<Vec<LoanDetail>> {
        let sql = format!("{SELECT_DETAIL} WHERE l.student_id = ?1 ORDER BY l.loan_id");
        let loans: Vec<LoanDetail> = sqlx::query_as(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(student_id = %student_id, count = loans.len(), "Student loans view");
        Ok(loans)
    }

    /// Open loans whose due date precedes `as_of`, most overdue first.
    pub async fn list_overdue_loans(&self, as_of: NaiveDate) -> DbResult<Vec<LoanDetail>> {
        let sql = format!(
            "{SELECT_DETAIL} WHERE l.status = 'open' AND l.due_date < ?1 ORDER BY l.due_date, l.loan_id"
        );
        let loans: Vec<LoanDetail> = sqlx::query_as(&sql)
            .bind(as_of)
            .fetch_all(&self.pool)
            .await?;

        debug!(%as_of, count = loans.len(), "Overdue loans view");
        Ok(loans)
    }

    /// What a student sees: their loans with standing as of a date,
    /// ordered by due date.
    pub async fn student_loans(
        &self,
        student_id: &str,
        as_of: NaiveDate,
    ) -> DbResult<Vec<StudentLoan>> {
        let sql = format!("{SELECT_DETAIL} WHERE l.student_id = ?1 ORDER BY l.due_date, l.loan_id");
        let rows: Vec<LoanDetail> = sqlx::query_as(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|detail| StudentLoan {
                standing: detail.standing(as_of),
                detail,
            })
            .collect())
    }

    /// The most recently issued open loans.
    pub async fn recent_open_loans(&self, limit: u32) -> DbResult<Vec<LoanDetail>> {
        validate_limit(limit)?;

        let sql = format!(
            "{SELECT_DETAIL} WHERE l.status = 'open' ORDER BY l.issue_date DESC, l.loan_id DESC LIMIT ?1"
        );
        let loans: Vec<LoanDetail> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    /// Dashboard counters, overdue counted as of `as_of`.
    pub async fn summary(&self, as_of: NaiveDate) -> DbResult<LibrarySummary> {
        let (titles, total_copies, available_copies, open_loans, overdue_loans): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM books),
                (SELECT COALESCE(SUM(total_copies), 0) FROM books),
                (SELECT COALESCE(SUM(available_copies), 0) FROM books),
                (SELECT COUNT(*) FROM loans WHERE status = 'open'),
                (SELECT COUNT(*) FROM loans WHERE status = 'open' AND due_date < ?1)
            "#,
        )
        .bind(as_of)
        .fetch_one(&self.pool)
        .await?;

        Ok(LibrarySummary {
            titles,
            total_copies,
            available_copies,
            open_loans,
            overdue_loans,
        })
    }

    /// Books where `total - available` differs from the number of open loans.
    ///
    /// Empty whenever copies only move through `LoanService`.
    pub async fn copy_count_discrepancies(&self) -> DbResult<Vec<CopyCountDiscrepancy>> {
        let rows: Vec<CopyCountDiscrepancy> = sqlx::query_as(
            r#"
            SELECT b.book_id, b.total_copies, b.available_copies,
                   COUNT(l.loan_id) AS open_loans
            FROM books b
            LEFT JOIN loans l ON l.book_id = b.book_id AND l.status = 'open'
            GROUP BY b.book_id, b.total_copies, b.available_copies
            HAVING b.total_copies - b.available_copies <> COUNT(l.loan_id)
            ORDER BY b.book_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if !rows.is_empty() {
            warn!(count = rows.len(), "Copy count discrepancies found");
        }
        Ok(rows)
    }

    /// Fails with `CopyCountMismatch` for the first book whose counters
    /// disagree with the ledger.
    pub async fn verify_copy_counts(&self) -> DbResult<()> {
        match self.copy_count_discrepancies().await?.into_iter().next() {
            Some(found) => Err(found.into_error().into()),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{date, lending, new_book, new_student, test_db};
    use crate::Database;
    use libris_core::{LoanStanding, Money};

    /// Dune (2 copies) lent to S1 on Jan 1 and returned Jan 20, lent to S2
    /// on Jan 2; Emma (1 copy) lent to S1 on Jan 10.
    async fn history() -> (Database, i64, i64) {
        let db = test_db().await;
        let dune = db.catalog().add(&new_book("Dune", 2)).await.unwrap();
        let emma = db.catalog().add(&new_book("Emma", 1)).await.unwrap();
        db.students().add(&new_student("S1")).await.unwrap();
        db.students().add(&new_student("S2")).await.unwrap();

        let (service, _) = lending(&db, date(2024, 1, 1));
        let l1 = service
            .issue_book(dune.book_id, "S1", date(2024, 1, 1), 14)
            .await
            .unwrap();
        service
            .issue_book(dune.book_id, "S2", date(2024, 1, 2), 14)
            .await
            .unwrap();
        service
            .issue_book(emma.book_id, "S1", date(2024, 1, 10), 14)
            .await
            .unwrap();
        service
            .return_book(l1.loan_id, date(2024, 1, 20), Money::from_cents(500))
            .await
            .unwrap();

        (db, dune.book_id, emma.book_id)
    }

    #[tokio::test]
    async fn test_open_and_overdue_views() {
        let (db, dune, emma) = history().await;
        let views = db.views();

        let open = views.list_open_loans().await.unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].book_id, dune);
        assert_eq!(open[0].student_name, "Student S2");
        assert_eq!(open[1].book_id, emma);
        assert_eq!(open[1].title, "Emma");

        let overdue = views.list_overdue_loans(date(2024, 1, 17)).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].student_id, "S2");
        assert_eq!(overdue[0].days_overdue(date(2024, 1, 17)), 1);

        assert!(views.list_overdue_loans(date(2024, 1, 16)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_student_loans_with_standing() {
        let (db, _, _) = history().await;
        let loans = db
            .views()
            .student_loans("S1", date(2024, 1, 20))
            .await
            .unwrap();

        let standings: Vec<(String, LoanStanding)> = loans
            .iter()
            .map(|l| (l.detail.title.clone(), l.standing))
            .collect();
        assert_eq!(
            standings,
            vec![
                ("Dune".to_string(), LoanStanding::Returned),
                ("Emma".to_string(), LoanStanding::Active),
            ]
        );

        let later = db
            .views()
            .student_loans("S1", date(2024, 1, 25))
            .await
            .unwrap();
        assert_eq!(later[1].standing, LoanStanding::Overdue);

        let history = db.views().list_loans_by_student("S1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].fine_cents, 2500);
        assert!(db.views().student_loans("S9", date(2024, 1, 25)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard() {
        let (db, _, emma) = history().await;
        let views = db.views();

        let summary = views.summary(date(2024, 1, 17)).await.unwrap();
        assert_eq!(
            summary,
            LibrarySummary {
                titles: 2,
                total_copies: 3,
                available_copies: 1,
                open_loans: 2,
                overdue_loans: 1,
            }
        );

        let recent = views.recent_open_loans(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].book_id, emma);
        assert!(views.recent_open_loans(0).await.is_err());
    }

    #[tokio::test]
    async fn test_copy_count_audit() {
        let (db, dune, _) = history().await;
        assert!(db.views().copy_count_discrepancies().await.unwrap().is_empty());
        db.views().verify_copy_counts().await.unwrap();

        sqlx::query("UPDATE books SET available_copies = 2 WHERE book_id = ?1")
            .bind(dune)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.views().verify_copy_counts().await.unwrap_err();
        assert_eq!(err.kind(), libris_core::ErrorKind::ConstraintViolation);

        let found = db.views().copy_count_discrepancies().await.unwrap();
        assert_eq!(
            found,
            vec![CopyCountDiscrepancy {
                book_id: dune,
                total_copies: 2,
                available_copies: 2,
                open_loans: 1,
            }]
        );
    }

    #[tokio::test]
    async fn test_empty_library_summary() {
        let db = test_db().await;
        let summary = db.views().summary(date(2024, 1, 1)).await.unwrap();
        assert_eq!(summary, LibrarySummary::default());
    }
}

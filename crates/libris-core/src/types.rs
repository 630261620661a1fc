//! # Domain Types
//!
//! Core domain types used throughout Libris.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐     │
//! │  │      Book        │   │      Loan        │   │     Student      │     │
//! │  │  ──────────────  │   │  ──────────────  │   │  ──────────────  │     │
//! │  │  book_id (auto)  │◄──│  book_id (FK)    │──►│  student_id (ext)│     │
//! │  │  title, author   │   │  loan_id (auto)  │   │  name, contact   │     │
//! │  │  total_copies    │   │  issue/due/ret.  │   └──────────────────┘     │
//! │  │  available_copies│   │  fine_cents      │                            │
//! │  └──────────────────┘   │  status          │   ┌──────────────────┐     │
//! │                         └──────────────────┘   │      Admin       │     │
//! │                                                │  username        │     │
//! │  ┌──────────────────┐   ┌──────────────────┐   │  credential      │     │
//! │  │   LoanStatus     │   │  LoanStanding    │   └──────────────────┘     │
//! │  │  Open → Returned │   │  Active/Overdue/ │                            │
//! │  └──────────────────┘   │  Returned        │                            │
//! │                         └──────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! - `book_id`, `loan_id`, `admin_id`: assigned by the store, monotonically
//! - `student_id`: assigned externally (e.g. a registration number "S001")

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::policy;

// =============================================================================
// Book
// =============================================================================

/// A catalog title and its copy counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Book {
    pub book_id: i64,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub publisher: Option<String>,
    pub published_year: Option<i32>,
    /// Unique when present.
    pub isbn: Option<String>,
    /// Fixed at creation.
    pub total_copies: i64,
    /// Copies on the shelf right now.
    pub available_copies: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Checks if at least one copy can be issued.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Number of copies currently out on loan.
    #[inline]
    pub fn copies_on_loan(&self) -> i64 {
        self.total_copies - self.available_copies
    }
}

/// Input for adding a title to the catalog.
///
/// `available_copies` is not part of the input; a new title starts with every
/// copy on the shelf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub publisher: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub total_copies: i64,
}

/// Catalog listing filter.
///
/// `query` matches title, author or ISBN as a substring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookFilter {
    pub query: Option<String>,
    /// Only titles with at least one copy on the shelf.
    pub available_only: bool,
    pub limit: u32,
}

impl BookFilter {
    /// Every title, up to `limit`.
    pub fn all(limit: u32) -> Self {
        BookFilter {
            query: None,
            available_only: false,
            limit,
        }
    }

    /// What students browse: available titles matching `query`.
    pub fn available(query: impl Into<String>, limit: u32) -> Self {
        BookFilter {
            query: Some(query.into()),
            available_only: true,
            limit,
        }
    }

    /// Restricts to titles matching `query`.
    pub fn matching(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

impl Default for BookFilter {
    fn default() -> Self {
        BookFilter::all(crate::DEFAULT_PAGE_SIZE)
    }
}

// =============================================================================
// Student
// =============================================================================

/// A borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Student {
    /// Registration number, never changes.
    pub student_id: String,
    pub name: String,
    pub contact: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewStudent {
    pub student_id: String,
    pub name: String,
    pub contact: Option<String>,
}

/// Mutable profile fields of a student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StudentProfile {
    pub name: String,
    pub contact: Option<String>,
}

// =============================================================================
// Admin
// =============================================================================

/// A librarian account.
///
/// The credential is an opaque value supplied by whatever component handles
/// sign-in; it is compared, never interpreted, and never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Admin {
    pub admin_id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub credential: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Admin {
    /// Exact comparison of the stored credential.
    pub fn credential_matches(&self, credential: &str) -> bool {
        self.credential == credential
    }
}

/// Input for registering an admin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewAdmin {
    pub username: String,
    pub credential: String,
}

// =============================================================================
// Loan Status
// =============================================================================

/// Ledger state of a loan.
///
/// ```text
///   ┌──────┐  return   ┌──────────┐
///   │ Open │ ────────► │ Returned │  (terminal)
///   └──────┘           └──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// The copy is out with the student.
    #[default]
    Open,
    /// The copy is back; the record is frozen.
    Returned,
}

impl LoanStatus {
    /// The only legal transition is Open → Returned.
    pub const fn can_transition_to(self, next: LoanStatus) -> bool {
        matches!((self, next), (LoanStatus::Open, LoanStatus::Returned))
    }

    /// Storage representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Open => "open",
            LoanStatus::Returned => "returned",
        }
    }
}

// =============================================================================
// Loan
// =============================================================================

/// One issue-to-return record of one copy to one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Loan {
    pub loan_id: i64,
    pub book_id: i64,
    pub student_id: String,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub return_date: Option<NaiveDate>,
    /// Zero until the loan is returned.
    pub fine_cents: i64,
    pub status: LoanStatus,
}

impl Loan {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == LoanStatus::Open
    }

    /// Fine recorded at return.
    #[inline]
    pub fn fine(&self) -> Money {
        Money::from_cents(self.fine_cents)
    }

    /// Open and past its due date as of `as_of`.
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        self.is_open() && policy::is_overdue(self.due_date, as_of)
    }

    /// Derived standing as of a date.
    pub fn standing(&self, as_of: NaiveDate) -> LoanStanding {
        LoanStanding::classify(self.status, self.due_date, as_of)
    }

    /// Computes the fine for returning this loan on `return_date`.
    ///
    /// ## Errors
    /// - `AlreadyReturned` if the loan is closed
    /// - `InvalidReturnDate` if `return_date` precedes the issue date
    pub fn settle(&self, return_date: NaiveDate, daily_rate: Money) -> CoreResult<Money> {
        if !self.status.can_transition_to(LoanStatus::Returned) {
            return Err(CoreError::AlreadyReturned {
                loan_id: self.loan_id,
                returned_on: self.return_date.unwrap_or(self.due_date),
            });
        }
        if return_date < self.issue_date {
            return Err(CoreError::InvalidReturnDate {
                loan_id: self.loan_id,
                issue_date: self.issue_date,
                return_date,
            });
        }
        Ok(policy::compute_fine(self.due_date, return_date, daily_rate))
    }
}

/// Outcome of a return: the closed loan and the fine charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnReceipt {
    pub loan: Loan,
    pub fine: Money,
    pub days_overdue: i64,
}

/// Input for appending a loan to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoan {
    pub book_id: i64,
    pub student_id: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
}

// =============================================================================
// Loan Standing
// =============================================================================

/// How a loan looks to a student on a given day. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LoanStanding {
    /// Out, not yet due (or due today).
    Active,
    /// Out, past the due date.
    Overdue,
    /// Back on the shelf.
    Returned,
}

impl LoanStanding {
    pub fn classify(status: LoanStatus, due_date: NaiveDate, as_of: NaiveDate) -> Self {
        match status {
            LoanStatus::Returned => LoanStanding::Returned,
            LoanStatus::Open if policy::is_overdue(due_date, as_of) => LoanStanding::Overdue,
            LoanStatus::Open => LoanStanding::Active,
        }
    }
}

// =============================================================================
// Query View Rows
// =============================================================================

/// A loan joined with its book and student, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LoanDetail {
    pub loan_id: i64,
    pub book_id: i64,
    pub title: String,
    pub author: String,
    pub student_id: String,
    pub student_name: String,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub return_date: Option<NaiveDate>,
    pub fine_cents: i64,
    pub status: LoanStatus,
}

impl LoanDetail {
    pub fn standing(&self, as_of: NaiveDate) -> LoanStanding {
        LoanStanding::classify(self.status, self.due_date, as_of)
    }

    /// Days past due as of `as_of` (zero for returned loans).
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        match self.status {
            LoanStatus::Open => policy::days_overdue(self.due_date, as_of),
            LoanStatus::Returned => 0,
        }
    }
}

/// A loan in a student's own view, with its standing resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StudentLoan {
    pub detail: LoanDetail,
    pub standing: LoanStanding,
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LibrarySummary {
    pub titles: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub open_loans: i64,
    pub overdue_loans: i64,
}

/// A title whose counters disagree with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CopyCountDiscrepancy {
    pub book_id: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub open_loans: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

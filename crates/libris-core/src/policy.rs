//! # Lending Policy
//!
//! Due date and fine arithmetic. Everything here is a pure function of
//! calendar dates; "today" is always passed in by the caller.
//!
//! ## Timeline
//! ```text
//! issue_date        due_date    due+1      due+5
//!     │                 │         │          │
//!     ●─────────────────●─────────●──────────●──────▶
//!     │◄─ loan period ─►│         │          │
//!                       │ fine 0  │ 1 × rate │ 5 × rate
//!
//! The due date itself is NOT overdue. Overdue starts the day after.
//! ```

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_daily_fine, validate_loan_period_days};
use crate::{DEFAULT_DAILY_FINE_CENTS, DEFAULT_LOAN_PERIOD_DAYS};

// =============================================================================
// Loan Policy
// =============================================================================

/// Deployment-level lending terms.
///
/// Some deployments lend for 14 days, others for 15; the rate is charged per
/// full day past the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoanPolicy {
    /// Days between issue and due date.
    pub loan_period_days: u32,

    /// Fine charged per overdue day.
    pub daily_fine: Money,
}

impl LoanPolicy {
    /// Creates a validated policy.
    pub fn new(loan_period_days: u32, daily_fine: Money) -> CoreResult<Self> {
        validate_loan_period_days(loan_period_days)?;
        validate_daily_fine(daily_fine)?;
        Ok(LoanPolicy {
            loan_period_days,
            daily_fine,
        })
    }

    /// Due date for a loan issued on `issue_date` under this policy.
    pub fn due_date(&self, issue_date: NaiveDate) -> CoreResult<NaiveDate> {
        due_date(issue_date, self.loan_period_days)
    }

    /// Fine for a loan due on `due_date` and returned on `return_date`.
    pub fn fine(&self, due_date: NaiveDate, return_date: NaiveDate) -> Money {
        compute_fine(due_date, return_date, self.daily_fine)
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        LoanPolicy {
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
            daily_fine: Money::from_cents(DEFAULT_DAILY_FINE_CENTS),
        }
    }
}

// =============================================================================
// Date Arithmetic
// =============================================================================

/// `issue_date + loan_period_days`.
///
/// ```rust
/// use chrono::NaiveDate;
/// use libris_core::policy::due_date;
///
/// let issued = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// assert_eq!(due_date(issued, 14).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
/// ```
pub fn due_date(issue_date: NaiveDate, loan_period_days: u32) -> CoreResult<NaiveDate> {
    issue_date
        .checked_add_days(Days::new(u64::from(loan_period_days)))
        .ok_or_else(|| {
            ValidationError::InvalidFormat {
                field: "due_date".to_string(),
                reason: format!("{issue_date} + {loan_period_days} days is out of range"),
            }
            .into()
        })
}

/// Whole days past the due date, never negative.
pub fn days_overdue(due_date: NaiveDate, on: NaiveDate) -> i64 {
    (on - due_date).num_days().max(0)
}

/// Whether a loan due on `due_date` counts as overdue on `as_of`.
#[inline]
pub fn is_overdue(due_date: NaiveDate, as_of: NaiveDate) -> bool {
    due_date < as_of
}

/// `max(0, return_date - due_date) × daily_rate`.
pub fn compute_fine(due_date: NaiveDate, return_date: NaiveDate, daily_rate: Money) -> Money {
    daily_rate.times_days(days_overdue(due_date, return_date))
}

// =============================================================================
// Unit Tests
// =============================================================================

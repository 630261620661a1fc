//! # Money Module
//!
//! Provides the `Money` type used for fine rates and fine amounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FINES ARE ACCUMULATED, NOT JUST DISPLAYED                              │
//! │                                                                         │
//! │  A float rate of 0.1 per day over 3 days:                               │
//! │    0.1 + 0.1 + 0.1 = 0.30000000000000004                                │
//! │                                                                         │
//! │  Integer cents:                                                         │
//! │    10 × 3 = 30 cents, exactly, every time                               │
//! │                                                                         │
//! │  The ledger stores fine_cents; only the UI converts to 0.30             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use libris_core::money::Money;
//!
//! let daily_rate = Money::from_major_minor(5, 0); // 5.00 per day
//! let fine = daily_rate.times_days(5);
//! assert_eq!(fine.cents(), 2500);
//! assert_eq!(fine.to_string(), "25.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// The currency itself is a deployment concern; the ledger only ever stores
/// the integer amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ```rust
    /// use libris_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(2, 50).cents(), 250);
    /// ```
    ///
    /// Saturates at the `i64` bounds like the other arithmetic on this type.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        Money(major.saturating_mul(100).saturating_add(minor))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a daily rate by a number of days.
    ///
    /// Saturates instead of wrapping; a fine that large is already absurd and
    /// must never turn negative.
    #[inline]
    pub const fn times_days(&self, days: i64) -> Self {
        Money(self.0.saturating_mul(days))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders `major.minor` without a currency symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

/// Totals fines across loans (student history, dashboard).
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

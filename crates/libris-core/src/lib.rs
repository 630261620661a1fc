//! # libris-core: Lending Rules for Libris
//!
//! This crate holds the library's domain types and every rule that can be
//! decided without touching storage: due dates, fines, loan transitions,
//! input validation and the copy-count invariant.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Libris Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Presentation (web pages, forms, sessions)          │   │
//! │  │    catalog search ──► issue ──► return ──► dashboards           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    libris-db (Storage Layer)                    │   │
//! │  │   CatalogStore, Membership, LoanLedger, LoanService, LoanViews  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ libris-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  policy   │  │   money   │  │ validation│  │   │
//! │  │   │   Book    │  │ due date  │  │   Money   │  │   rules   │  │   │
//! │  │   │   Loan    │  │   fines   │  │           │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Book, Student, Loan, etc.)
//! - [`policy`] - Loan period, due dates and fines
//! - [`money`] - Integer money for fine rates and amounts
//! - [`invariants`] - The copy-count invariant
//! - [`error`] - Domain error types
//! - [`validation`] - Field rules
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use libris_core::{LoanPolicy, Money};
//!
//! let policy = LoanPolicy::new(14, Money::from_cents(500)).unwrap();
//! let issued = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let due = policy.due_date(issued).unwrap();
//!
//! // Returned five days late
//! let returned = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
//! assert_eq!(policy.fine(due, returned).cents(), 2500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod invariants;
pub mod money;
pub mod policy;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, Entity, ErrorKind, ValidationError};
pub use money::Money;
pub use policy::LoanPolicy;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Days between issue and due date unless configured otherwise.
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;

/// Upper bound for a configured loan period.
pub const MAX_LOAN_PERIOD_DAYS: u32 = 365;

/// Fine per overdue day unless configured otherwise (5.00).
pub const DEFAULT_DAILY_FINE_CENTS: i64 = 500;

/// Largest number of copies a single title can be created with.
pub const MAX_COPIES_PER_TITLE: i64 = 10_000;

/// Listing size when the caller does not pick one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest listing a single query returns.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Number of open loans on the admin dashboard.
pub const RECENT_LOANS_LIMIT: u32 = 10;

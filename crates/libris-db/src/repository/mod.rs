//! # Repository Module
//!
//! The three stores behind the loan service.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Store              Public API                 Crate-only (txn) helpers │
//! │  ─────              ──────────                 ──────────────────────── │
//! │  CatalogStore       add / get / find / list    fetch_book               │
//! │                     delete / count             take_copy, restore_copy  │
//! │                                                                         │
//! │  StudentRepository  add / get / exists / list  fetch_student            │
//! │  AdminRepository    add / find / authenticate                           │
//! │                                                                         │
//! │  LoanLedger         get / list_open            fetch_loan, create       │
//! │                     list_by_student            mark_returned            │
//! │                     list_overdue               count_open_for_book      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The crate-only helpers take a `&mut SqliteConnection` so the loan service
//! can run them inside one transaction. Nothing outside this crate can change
//! a copy count or a loan's status.

pub mod catalog;
pub mod ledger;
pub mod membership;

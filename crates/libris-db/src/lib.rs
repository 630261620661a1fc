//! # libris-db: Storage and Transactions for Libris
//!
//! This crate persists the catalog, the membership records and the loan
//! ledger in SQLite (via sqlx) and runs the issue/return transactions that
//! keep them consistent.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Libris Data Flow                                 │
//! │                                                                         │
//! │  Web handler (issue form, return form, dashboards)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    libris-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LoanService  │    │    Stores     │    │  Migrations  │  │   │
//! │  │   │ (service.rs)  │    │ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ issue_book    │───►│ CatalogStore  │    │ 001_initial  │  │   │
//! │  │   │ return_book   │    │ Students      │    │              │  │   │
//! │  │   │ one txn each  │    │ LoanLedger    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   LoanViews (views.rs): open, overdue, per-student, summary    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   ~/.local/share/libris/library.db                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and store accessors
//! - [`migrations`] - Embedded database migrations
//! - [`config`] - `library.toml` plus environment overrides
//! - [`error`] - Database error types
//! - [`repository`] - Catalog, membership and ledger stores
//! - [`service`] - Atomic issue and return
//! - [`views`] - Read-only projections
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use libris_db::{Database, LibraryConfig};
//! use mockable::DefaultClock;
//!
//! let config = LibraryConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let lending = db.lending(Arc::new(DefaultClock), config.loan_policy()?);
//! let loan = lending.issue_book_today(7, "S001").await?;
//! let receipt = lending.return_book_today(loan.loan_id).await?;
//! println!("fine: {}", receipt.fine);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;
pub mod views;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, LibraryConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use service::{LoanService, SharedClock};
pub use views::LoanViews;

// Store re-exports for convenience
pub use repository::catalog::CatalogStore;
pub use repository::ledger::LoanLedger;
pub use repository::membership::{AdminRepository, StudentRepository};

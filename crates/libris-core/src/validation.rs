//! # Validation Module
//!
//! Input validation for Libris.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation                                                 │
//! │  ├── Form parsing (dates, numbers)                                     │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Stores / Loan Service (Rust)                                 │
//! │  └── THIS MODULE: field rules, checked before any write                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints (ISBN, student_id, username)                   │
//! │  └── Foreign key constraints (loans → books, students)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use libris_core::validation::{validate_student_id, validate_total_copies};
//!
//! validate_student_id("S001").unwrap();
//! validate_total_copies(3).unwrap();
//! assert!(validate_total_copies(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_COPIES_PER_TITLE, MAX_LOAN_PERIOD_DAYS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a book title: non-empty, at most 200 characters.
pub fn validate_title(title: &str) -> ValidationResult<()> {
    required("title", title, 200)
}

/// Validates an author name: non-empty, at most 200 characters.
pub fn validate_author(author: &str) -> ValidationResult<()> {
    required("author", author, 200)
}

/// Strips ISBN separators (hyphens, spaces) and upper-cases a trailing `x`.
///
/// Stored ISBNs are always in this form, so the same number entered with
/// different punctuation collides on the unique index.
///
/// ```rust
/// use libris_core::validation::compact_isbn;
///
/// assert_eq!(compact_isbn(" 0-439-42089-x "), "043942089X");
/// ```
pub fn compact_isbn(isbn: &str) -> String {
    isbn.trim()
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Validates an ISBN and returns its compact form.
///
/// ## Rules
/// - Digits, with optional hyphens or spaces as separators
/// - 10 or 13 significant characters; an ISBN-10 may end in `X`
///
/// No checksum verification: older catalogs carry mistyped ISBNs that still
/// have to be searchable.
///
/// ## Example
/// ```rust
/// use libris_core::validation::validate_isbn;
///
/// assert_eq!(validate_isbn("978-0-441-17271-9").unwrap(), "9780441172719");
/// assert!(validate_isbn("0-441-17271-7").is_ok());
/// assert!(validate_isbn("043942089X").is_ok());
/// assert!(validate_isbn("12345").is_err());
/// ```
pub fn validate_isbn(isbn: &str) -> ValidationResult<String> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "isbn".to_string(),
        reason: reason.to_string(),
    };

    let compact = compact_isbn(isbn);
    let chars: Vec<char> = compact.chars().collect();

    if chars.is_empty() {
        return Err(ValidationError::Required {
            field: "isbn".to_string(),
        });
    }

    let (body, last) = chars.split_at(chars.len() - 1);
    let digits_ok = body.iter().all(char::is_ascii_digit)
        && (last[0].is_ascii_digit() || (chars.len() == 10 && last[0] == 'X'));

    if !digits_ok {
        return Err(invalid("must contain only digits and separators"));
    }

    if chars.len() != 10 && chars.len() != 13 {
        return Err(invalid("must have 10 or 13 digits"));
    }

    Ok(compact)
}

/// Validates a student registration number.
///
/// ## Rules
/// - Non-empty, at most 32 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use libris_core::validation::validate_student_id;
///
/// assert!(validate_student_id("S001").is_ok());
/// assert!(validate_student_id("2024-CS-17").is_ok());
/// assert!(validate_student_id("S 001").is_err());
/// ```
pub fn validate_student_id(student_id: &str) -> ValidationResult<()> {
    required("student_id", student_id, 32)?;

    if !student_id
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "student_id".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a student's display name: non-empty, at most 100 characters.
pub fn validate_student_name(name: &str) -> ValidationResult<()> {
    required("name", name, 100)
}

/// Validates an admin username.
///
/// Same character rules as a student id, at most 50 characters.
pub fn validate_username(username: &str) -> ValidationResult<()> {
    required("username", username, 50)?;

    if !username
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, dots, hyphens, and underscores"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates an opaque admin credential. Only emptiness is checked.
pub fn validate_credential(credential: &str) -> ValidationResult<()> {
    if credential.is_empty() {
        return Err(ValidationError::Required {
            field: "credential".to_string(),
        });
    }
    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (matches everything)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the copy count of a new title.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Catalog: Add Book                                                      │
/// │                                                                         │
/// │  Librarian enters copies: 3                                            │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_total_copies(3) ← THIS FUNCTION                              │
/// │       │                                                                 │
/// │       ├── copies < 1?      → Error: out of range                       │
/// │       ├── copies > 10000?  → Error: out of range                       │
/// │       │                                                                 │
/// │       └── OK → available_copies = total_copies = 3                     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_total_copies(copies: i64) -> ValidationResult<()> {
    if !(1..=MAX_COPIES_PER_TITLE).contains(&copies) {
        return Err(ValidationError::OutOfRange {
            field: "total_copies".to_string(),
            min: 1,
            max: MAX_COPIES_PER_TITLE,
        });
    }

    Ok(())
}

/// Validates an optional publication year (0 through 9999).
pub fn validate_published_year(year: Option<i32>) -> ValidationResult<()> {
    match year {
        Some(y) if !(0..=9999).contains(&y) => Err(ValidationError::OutOfRange {
            field: "published_year".to_string(),
            min: 0,
            max: 9999,
        }),
        _ => Ok(()),
    }
}

/// Validates a loan period in days.
pub fn validate_loan_period_days(days: u32) -> ValidationResult<()> {
    if !(1..=MAX_LOAN_PERIOD_DAYS).contains(&days) {
        return Err(ValidationError::OutOfRange {
            field: "loan_period_days".to_string(),
            min: 1,
            max: i64::from(MAX_LOAN_PERIOD_DAYS),
        });
    }

    Ok(())
}

/// Validates a daily fine rate. Zero disables fines.
///
/// ## Example
/// ```rust
/// use libris_core::money::Money;
/// use libris_core::validation::validate_daily_fine;
///
/// assert!(validate_daily_fine(Money::from_cents(500)).is_ok());
/// assert!(validate_daily_fine(Money::zero()).is_ok());
/// assert!(validate_daily_fine(Money::from_cents(-1)).is_err());
/// ```
pub fn validate_daily_fine(rate: Money) -> ValidationResult<()> {
    if rate.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "daily_fine".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a listing limit.
pub fn validate_limit(limit: u32) -> ValidationResult<()> {
    if limit == 0 || limit > crate::MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: i64::from(crate::MAX_PAGE_SIZE),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_title_and_author() {
        assert!(validate_title("Dune").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"A".repeat(201)).is_err());
        assert!(validate_author("Frank Herbert").is_ok());
        assert!(validate_author("").is_err());
    }

    #[test]
    fn test_validate_isbn() {
        assert!(validate_isbn("9780441172719").is_ok());
        assert!(validate_isbn("978 0 441 17271 9").is_ok());
        assert_eq!(validate_isbn("043942089x").unwrap(), "043942089X");
        assert_eq!(validate_isbn(" 978-0-441-17271-9 ").unwrap(), "9780441172719");

        assert!(validate_isbn("").is_err());
        assert!(validate_isbn("97804411727X9").is_err());
        assert!(validate_isbn("978044117271").is_err());
        assert!(validate_isbn("ISBN9780441172719").is_err());
    }

    #[test]
    fn test_validate_student_id() {
        assert!(validate_student_id("S001").is_ok());
        assert!(validate_student_id("cs_2024_17").is_ok());

        assert!(validate_student_id("").is_err());
        assert!(validate_student_id("S/001").is_err());
        assert!(validate_student_id(&"S".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_username_and_credential() {
        assert!(validate_username("admin").is_ok());
        assert!(validate_username("j.doe").is_ok());
        assert!(validate_username("j doe").is_err());
        assert!(validate_credential("x").is_ok());
        assert!(validate_credential("").is_err());
    }

    #[test]
    fn test_validate_total_copies() {
        assert!(validate_total_copies(1).is_ok());
        assert!(validate_total_copies(MAX_COPIES_PER_TITLE).is_ok());

        assert!(validate_total_copies(0).is_err());
        assert!(validate_total_copies(-3).is_err());
        assert!(validate_total_copies(MAX_COPIES_PER_TITLE + 1).is_err());
    }

    #[test]
    fn test_validate_loan_period_days() {
        assert!(validate_loan_period_days(14).is_ok());
        assert!(validate_loan_period_days(MAX_LOAN_PERIOD_DAYS).is_ok());
        assert!(validate_loan_period_days(0).is_err());
        assert!(validate_loan_period_days(MAX_LOAN_PERIOD_DAYS + 1).is_err());
    }

    #[test]
    fn test_validate_published_year() {
        assert!(validate_published_year(None).is_ok());
        assert!(validate_published_year(Some(1965)).is_ok());
        assert!(validate_published_year(Some(-1)).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  dune ").unwrap(), "dune");
        assert_eq!(validate_search_query("").unwrap(), "");
        assert!(validate_search_query(&"q".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(10).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(crate::MAX_PAGE_SIZE + 1).is_err());
    }
}

//! # Catalog Store
//!
//! Database operations for books.
//!
//! ## Key Operations
//! - Add / delete titles (admin)
//! - Point lookup by book_id
//! - Substring search over title, author and ISBN
//!
//! ## Copy Counters
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  books.total_copies      set once by add(), never updated               │
//! │  books.available_copies  starts at total_copies                         │
//! │                          moved ONLY by LoanService inside its txn       │
//! │                                                                         │
//! │  Nothing in this file writes available_copies after the insert.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use libris_core::validation::{
    compact_isbn, validate_author, validate_isbn, validate_limit, validate_published_year,
    validate_search_query, validate_title, validate_total_copies,
};
use libris_core::{Book, BookFilter, Entity, NewBook};

const SELECT_BOOK: &str = r#"
    SELECT book_id, title, author, genre, publisher, published_year, isbn,
           total_copies, available_copies, created_at
    FROM books
"#;

/// Store for the book catalog.
///
/// ## Usage
/// ```rust,ignore
/// let catalog = db.catalog();
///
/// let book = catalog.add(&NewBook { title: "Dune".into(), .. }).await?;
/// let found = catalog.list(&BookFilter::all(20).matching("dune")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    /// Creates a new CatalogStore.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogStore { pool }
    }

    /// Adds a title with every copy on the shelf.
    ///
    /// ## Errors
    /// - `Validation` for an empty title/author, malformed ISBN or bad copy count
    /// - `UniqueViolation` if the ISBN is already in the catalog, however it
    ///   is punctuated
    pub async fn add(&self, book: &NewBook) -> DbResult<Book> {
        validate_title(&book.title)?;
        validate_author(&book.author)?;
        validate_total_copies(book.total_copies)?;
        validate_published_year(book.published_year)?;
        let isbn = match book.isbn.as_deref().map(str::trim) {
            Some(isbn) if !isbn.is_empty() => Some(validate_isbn(isbn)?),
            _ => None,
        };

        let created: Book = sqlx::query_as(
            r#"
            INSERT INTO books (
                title, author, genre, publisher, published_year, isbn,
                total_copies, available_copies
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            RETURNING book_id, title, author, genre, publisher, published_year, isbn,
                      total_copies, available_copies, created_at
            "#,
        )
        .bind(book.title.trim())
        .bind(book.author.trim())
        .bind(non_blank(book.genre.as_deref()))
        .bind(non_blank(book.publisher.as_deref()))
        .bind(book.published_year)
        .bind(isbn)
        .bind(book.total_copies)
        .fetch_one(&self.pool)
        .await?;

        info!(
            book_id = created.book_id,
            total_copies = created.total_copies,
            "Book added to catalog"
        );
        Ok(created)
    }

    /// Gets a book by its ID.
    ///
    /// ## Errors
    /// - `NotFound(Book)` if the ID does not resolve
    pub async fn get(&self, book_id: i64) -> DbResult<Book> {
        self.find(book_id)
            .await?
            .ok_or_else(|| DbError::not_found(Entity::Book, book_id))
    }

    /// Gets a book by its ID, `None` if absent.
    pub async fn find(&self, book_id: i64) -> DbResult<Option<Book>> {
        let mut conn = self.pool.acquire().await?;
        fetch_book(&mut conn, book_id).await
    }

    /// Lists books matching a filter, ordered by title.
    ///
    /// ## Matching
    /// The query is a case-insensitive substring match against title, author
    /// and ISBN. `%` and `_` in the query match themselves. ISBNs are stored
    /// compact, so the ISBN comparison ignores hyphens and spaces in the query.
    pub async fn list(&self, filter: &BookFilter) -> DbResult<Vec<Book>> {
        validate_limit(filter.limit)?;
        let (pattern, isbn_pattern) = match filter.query.as_deref() {
            Some(query) => {
                let query = validate_search_query(query)?;
                let isbn = compact_isbn(&query);
                if query.is_empty() {
                    (None, None)
                } else {
                    (
                        Some(like_pattern(&query)),
                        (!isbn.is_empty()).then(|| like_pattern(&isbn)),
                    )
                }
            }
            None => (None, None),
        };

        debug!(
            query = ?filter.query,
            available_only = filter.available_only,
            limit = filter.limit,
            "Listing books"
        );

        let sql = format!(
            r#"{SELECT_BOOK}
            WHERE (?1 IS NULL
                   OR title  LIKE ?1 ESCAPE '\'
                   OR author LIKE ?1 ESCAPE '\'
                   OR isbn   LIKE ?4 ESCAPE '\')
              AND (?2 = 0 OR available_copies > 0)
            ORDER BY title COLLATE NOCASE, book_id
            LIMIT ?3
            "#
        );

        let books: Vec<Book> = sqlx::query_as(&sql)
            .bind(pattern)
            .bind(filter.available_only)
            .bind(filter.limit)
            .bind(isbn_pattern)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = books.len(), "Book listing returned");
        Ok(books)
    }

    /// Removes a title from the catalog.
    ///
    /// ## Errors
    /// - `NotFound(Book)` if the ID does not resolve
    /// - `ForeignKeyViolation` if any loan, open or returned, references it
    pub async fn delete(&self, book_id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE book_id = ?1")
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Entity::Book, book_id));
        }

        info!(book_id, "Book removed from catalog");
        Ok(())
    }

    /// Number of titles in the catalog.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Connection-Level Operations (shared with LoanService transactions)
// =============================================================================

pub(crate) async fn fetch_book(
    conn: &mut SqliteConnection,
    book_id: i64,
) -> DbResult<Option<Book>> {
    let sql = format!("{SELECT_BOOK} WHERE book_id = ?1");
    let book = sqlx::query_as(&sql)
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(book)
}

/// Takes one copy off the shelf. `false` if none was available (or the book
/// does not exist).
pub(crate) async fn take_copy(conn: &mut SqliteConnection, book_id: i64) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE books
        SET available_copies = available_copies - 1
        WHERE book_id = ?1 AND available_copies > 0
        "#,
    )
    .bind(book_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Puts one copy back. `false` if the shelf was already full.
pub(crate) async fn restore_copy(conn: &mut SqliteConnection, book_id: i64) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE books
        SET available_copies = available_copies + 1
        WHERE book_id = ?1 AND available_copies < total_copies
        "#,
    )
    .bind(book_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `%query%` with LIKE wildcards in the query escaped.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// =============================================================================
// Unit Tests
// =============================================================================

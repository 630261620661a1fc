//! # Seed Data Generator
//!
//! Populates a library database with a small catalog, a few students, one
//! admin and a loan history for development.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (library.toml / LIBRIS_DB_PATH)
//! cargo run -p libris-db --bin seed
//!
//! # Specify database path
//! cargo run -p libris-db --bin seed -- --db ./data/library.db
//! ```
//!
//! ## Generated Loans
//! Loans are back-dated relative to today so the dashboards show a mix of
//! active, overdue and returned (some with fines) rows.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use libris_core::{NewAdmin, NewBook, NewStudent, RECENT_LOANS_LIMIT};
use libris_db::{Database, LibraryConfig, LoanService};
use mockable::DefaultClock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (title, author, genre, published year, copies)
const BOOKS: &[(&str, &str, &str, i32, i64)] = &[
    ("Dune", "Frank Herbert", "Science Fiction", 1965, 3),
    ("Emma", "Jane Austen", "Classic", 1815, 2),
    ("The Hobbit", "J. R. R. Tolkien", "Fantasy", 1937, 4),
    ("Neuromancer", "William Gibson", "Science Fiction", 1984, 1),
    ("Middlemarch", "George Eliot", "Classic", 1871, 1),
    ("The Left Hand of Darkness", "Ursula K. Le Guin", "Science Fiction", 1969, 2),
    ("Things Fall Apart", "Chinua Achebe", "Literary Fiction", 1958, 2),
    ("A Brief History of Time", "Stephen Hawking", "Science", 1988, 1),
    ("The Name of the Rose", "Umberto Eco", "Mystery", 1980, 2),
    ("Beloved", "Toni Morrison", "Literary Fiction", 1987, 1),
];

/// (student id, name, contact)
const STUDENTS: &[(&str, &str, &str)] = &[
    ("S001", "Amara Okafor", "amara@example.edu"),
    ("S002", "Ben Lindqvist", "ben@example.edu"),
    ("S003", "Chen Wei", "chen@example.edu"),
    ("S004", "Dana Morales", "dana@example.edu"),
    ("S005", "Eitan Levi", "eitan@example.edu"),
];

/// (book index, student index, issued days ago, returned days ago)
const LOANS: &[(usize, usize, u64, Option<u64>)] = &[
    (0, 0, 3, None),
    (1, 1, 20, None),
    (2, 2, 40, Some(30)),
    (3, 3, 25, Some(5)),
    (0, 4, 16, None),
    (6, 0, 10, Some(2)),
    (8, 2, 1, None),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Libris Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: from library.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = LibraryConfig::load(None)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("Libris Seed Data Generator");
    println!("==========================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.db_config()).await?;
    info!("Connected to database, migrations applied");

    let existing = db.catalog().count().await?;
    if existing > 0 {
        println!("Database already has {} titles", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut book_ids = Vec::with_capacity(BOOKS.len());
    for (title, author, genre, year, copies) in BOOKS {
        let book = db
            .catalog()
            .add(&NewBook {
                title: title.to_string(),
                author: author.to_string(),
                genre: Some(genre.to_string()),
                published_year: Some(*year),
                total_copies: *copies,
                ..NewBook::default()
            })
            .await?;
        book_ids.push(book.book_id);
    }
    println!("Added {} titles", book_ids.len());

    for (student_id, name, contact) in STUDENTS {
        db.students()
            .add(&NewStudent {
                student_id: student_id.to_string(),
                name: name.to_string(),
                contact: Some(contact.to_string()),
            })
            .await?;
    }
    println!("Added {} students", STUDENTS.len());

    db.admins()
        .add(&NewAdmin {
            username: "admin".to_string(),
            credential: "admin".to_string(),
        })
        .await?;
    println!("Added admin account 'admin'");

    let lending = db.lending(Arc::new(DefaultClock), config.loan_policy()?);
    let issued = seed_loans(&lending, &book_ids).await?;
    println!("Issued {} loans", issued);

    let summary = db.views().summary(lending.today()).await?;
    println!();
    println!("Summary as of {}:", lending.today());
    println!("  Titles:            {}", summary.titles);
    println!("  Copies:            {}", summary.total_copies);
    println!("  Available copies:  {}", summary.available_copies);
    println!("  Open loans:        {}", summary.open_loans);
    println!("  Overdue loans:     {}", summary.overdue_loans);

    let recent = db.views().recent_open_loans(RECENT_LOANS_LIMIT).await?;
    println!();
    println!("Most recent open loans:");
    for loan in recent {
        println!(
            "  #{:<4} {:<28} {:<16} due {}",
            loan.loan_id, loan.title, loan.student_name, loan.due_date
        );
    }
    println!();
    println!("Seed complete!");

    db.close().await;
    Ok(())
}

/// Issues (and returns) the back-dated loan history. Returns the loan count.
async fn seed_loans(
    lending: &LoanService,
    book_ids: &[i64],
) -> Result<usize, Box<dyn std::error::Error>> {
    let today = lending.today();
    let policy = lending.policy();

    for (book, student, issued_ago, returned_ago) in LOANS {
        let loan = lending
            .issue_book(
                book_ids[*book],
                STUDENTS[*student].0,
                days_ago(today, *issued_ago)?,
                policy.loan_period_days,
            )
            .await?;

        if let Some(returned_ago) = returned_ago {
            let receipt = lending
                .return_book(loan.loan_id, days_ago(today, *returned_ago)?, policy.daily_fine)
                .await?;
            if !receipt.fine.is_zero() {
                info!(
                    loan_id = loan.loan_id,
                    fine = %receipt.fine,
                    "Seeded late return"
                );
            }
        }
    }

    Ok(LOANS.len())
}

fn days_ago(today: NaiveDate, days: u64) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    today
        .checked_sub_days(Days::new(days))
        .ok_or_else(|| format!("{today} minus {days} days is out of range").into())
}

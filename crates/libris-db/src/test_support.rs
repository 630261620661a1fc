//! Shared fixtures for store and service tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use libris_core::{LoanPolicy, NewBook, NewStudent};
use mockable::Clock;

use crate::pool::{Database, DbConfig};
use crate::service::LoanService;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A clock pinned to local noon of a settable day.
pub struct FixedClock(Mutex<DateTime<Local>>);

impl FixedClock {
    pub fn on(day: NaiveDate) -> Arc<Self> {
        Arc::new(Self(Mutex::new(local_noon(day))))
    }

    pub fn set(&self, day: NaiveDate) {
        *self.0.lock().unwrap() = local_noon(day);
    }
}

fn local_noon(day: NaiveDate) -> DateTime<Local> {
    Local
        .from_local_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
        .earliest()
        .unwrap()
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        *self.0.lock().unwrap()
    }

    fn utc(&self) -> DateTime<Utc> {
        self.local().with_timezone(&Utc)
    }
}

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

static FILE_DB_SEQ: AtomicU32 = AtomicU32::new(0);

/// A file-backed database for tests that need several connections.
pub async fn file_db(max_connections: u32) -> (Database, PathBuf) {
    let path = std::env::temp_dir().join(format!(
        "libris-test-{}-{}.db",
        std::process::id(),
        FILE_DB_SEQ.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = std::fs::remove_file(&path);
    let config = DbConfig::new(&path).max_connections(max_connections);
    (Database::new(config).await.unwrap(), path)
}

pub fn remove_file_db(path: &PathBuf) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

pub fn new_book(title: &str, total_copies: i64) -> NewBook {
    NewBook {
        title: title.to_string(),
        author: "Test Author".to_string(),
        total_copies,
        ..NewBook::default()
    }
}

pub fn new_student(student_id: &str) -> NewStudent {
    NewStudent {
        student_id: student_id.to_string(),
        name: format!("Student {student_id}"),
        contact: None,
    }
}

/// Loan service on `today` with the default policy (14 days, 5.00/day).
pub fn lending(db: &Database, today: NaiveDate) -> (LoanService, Arc<FixedClock>) {
    let clock = FixedClock::on(today);
    (db.lending(clock.clone(), LoanPolicy::default()), clock)
}

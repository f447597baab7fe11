//! SQLite persistence layer.
//!
//! The database is a single-writer, multi-reader resource behind a mutex;
//! every write runs inside a connection-scoped transaction that commits or
//! rolls back on all exit paths. Higher layers only see typed operations
//! and the shared error taxonomy, never SQL.

pub mod catalog;
pub mod mcq;
pub mod progress;
pub mod reviews;
pub mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::Connection;

use crate::error::{Error, Result};

pub use catalog::ItemFilter;
pub use schema::run_migrations;

pub type DbPool = Arc<Mutex<Connection>>;

/// Inclusive calendar-date bounds on `reviewed_at`, matching on the UTC
/// date of the stored instant. Either side may be open.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// SQL fragment (`AND DATE(col) >= ? ...`) plus its parameters.
    pub(crate) fn clause(&self, column: &str) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut args = Vec::new();
        if let Some(start) = self.start {
            sql.push_str(&format!(" AND DATE({}) >= ?", column));
            args.push(Value::Text(start.to_string()));
        }
        if let Some(end) = self.end {
            sql.push_str(&format!(" AND DATE({}) <= ?", column));
            args.push(Value::Text(end.to_string()));
        }
        (sql, args)
    }
}

/// Lenient instant parse for bookkeeping timestamps; falls back to now.
pub(crate) fn parse_instant_lenient(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Strict instant parse for columns scheduling depends on.
pub(crate) fn parse_instant(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Integrity(format!("unparseable {} instant '{}': {}", column, value, e)))
}

/// Acquire the database lock. A poisoned mutex means a thread panicked
/// mid-write, which we treat as a programming bug.
pub fn try_lock(pool: &DbPool) -> Result<MutexGuard<'_, Connection>> {
    pool.lock().map_err(|_: PoisonError<_>| {
        Error::Integrity("database mutex poisoned by a panicked thread".to_string())
    })
}

/// Open (or create) the database at `path` and bring the schema up to date.
pub fn init_db(path: &Path) -> Result<DbPool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let conn = Connection::open(path)?;
    configure(&conn)?;
    run_migrations(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Connection pragmas shared by file-backed and in-memory databases.
pub(crate) fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

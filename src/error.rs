//! Error taxonomy shared by the store, schedulers, and generator.
//!
//! Six kinds, mapped from SQLite failures at the db boundary so higher
//! layers never see the persistence dialect.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A referenced item or review does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique-constraint violation (duplicate item surface, duplicate review).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Argument outside its contract; rejected before any I/O.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// Referential or check constraint broken; treated as a programming bug.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Lower-level persistence failure; the transaction was rolled back.
    #[error("database error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// The MCQ generator could not assemble four unique options.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Classify a rusqlite error into the taxonomy.
    ///
    /// `context` names the entity being operated on, for the message only.
    pub fn from_sqlite(err: rusqlite::Error, context: &str) -> Self {
        use rusqlite::ffi::ErrorCode;

        match &err {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound(context.to_string()),
            rusqlite::Error::FromSqlConversionFailure(..) => {
                Error::Integrity(format!("{}: {}", context, err))
            }
            rusqlite::Error::SqliteFailure(inner, _) => match inner.code {
                ErrorCode::ConstraintViolation => match inner.extended_code {
                    // SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE
                    1555 | 2067 => Error::Conflict(context.to_string()),
                    // SQLITE_CONSTRAINT_FOREIGNKEY, SQLITE_CONSTRAINT_CHECK
                    787 | 275 => Error::Integrity(context.to_string()),
                    _ => Error::Integrity(context.to_string()),
                },
                _ => Error::Backend(err),
            },
            _ => Error::Backend(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn no_rows_maps_to_not_found() {
        let err = Error::from_sqlite(rusqlite::Error::QueryReturnedNoRows, "review 7");
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER UNIQUE); INSERT INTO t VALUES (1);")
            .unwrap();
        let sqlite_err = conn
            .execute("INSERT INTO t VALUES (1)", [])
            .unwrap_err();
        let err = Error::from_sqlite(sqlite_err, "t");
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn foreign_key_violation_maps_to_integrity() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE parent (id INTEGER PRIMARY KEY);
            CREATE TABLE child (pid INTEGER REFERENCES parent(id));
            "#,
        )
        .unwrap();
        let sqlite_err = conn
            .execute("INSERT INTO child VALUES (99)", [])
            .unwrap_err();
        let err = Error::from_sqlite(sqlite_err, "child");
        assert!(matches!(err, Error::Integrity(_)));
    }
}

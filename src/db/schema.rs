//! Schema definitions and versioned migrations.
//!
//! Version 1 is the base catalog/review/progress schema; version 2 adds
//! the MCQ review tables. `run_migrations` is idempotent and safe to call
//! on every startup.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

const V1_TABLES: &str = r#"
-- Vocabulary words with readings and meanings
CREATE TABLE IF NOT EXISTS vocabulary (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    word TEXT NOT NULL,                    -- kanji/kana surface (e.g. "単語")
    reading TEXT NOT NULL,                 -- kana only (e.g. "たんご")
    meanings TEXT NOT NULL,                -- JSON: {"vi": [...], "en": [...]}
    sino_vietnamese TEXT,                  -- Hán Việt reading (e.g. "đơn ngữ")
    jlpt_level TEXT,                       -- n5..n1 or NULL
    part_of_speech TEXT,
    tags TEXT,                             -- JSON array
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Individual kanji characters
CREATE TABLE IF NOT EXISTS kanji (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    character TEXT NOT NULL UNIQUE,
    on_readings TEXT NOT NULL,             -- JSON array
    kun_readings TEXT NOT NULL,            -- JSON array
    meanings TEXT NOT NULL,                -- JSON: {"vi": [...], "en": [...]}
    sino_vietnamese TEXT,
    jlpt_level TEXT,
    stroke_count INTEGER,
    radical TEXT,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Grammar explanations with examples (managed by an external surface;
-- the table lives here so one migration owns the whole schema)
CREATE TABLE IF NOT EXISTS grammar_points (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    structure TEXT,
    explanation TEXT NOT NULL,
    jlpt_level TEXT,
    examples TEXT NOT NULL,                -- JSON array of {"jp", "vi", "en"}
    related_grammar TEXT,                  -- JSON array of grammar ids
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- FSRS state per flashcard (vocabulary or kanji)
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL,              -- vocabulary.id or kanji.id
    item_kind TEXT NOT NULL,               -- 'vocab' or 'kanji'
    fsrs_card_state TEXT NOT NULL,         -- JSON card blob
    due_date TEXT NOT NULL,                -- denormalized from the card
    last_reviewed TEXT,
    review_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(item_id, item_kind)
);

-- Append-only flashcard review log
CREATE TABLE IF NOT EXISTS review_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    review_id INTEGER NOT NULL,
    rating INTEGER NOT NULL,               -- 1=Again, 2=Hard, 3=Good, 4=Easy
    duration_ms INTEGER,
    reviewed_at TEXT NOT NULL,
    FOREIGN KEY (review_id) REFERENCES reviews(id) ON DELETE CASCADE
);

-- Per-user progress and streak tracking
CREATE TABLE IF NOT EXISTS progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL DEFAULT 'default',
    current_level TEXT NOT NULL DEFAULT 'n5',
    target_level TEXT NOT NULL DEFAULT 'n5',
    stats TEXT NOT NULL,                   -- JSON blob
    milestones TEXT,                       -- JSON array
    streak_days INTEGER NOT NULL DEFAULT 0,
    last_review_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(user_id)
);
"#;

const V1_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_vocabulary_jlpt ON vocabulary(jlpt_level);
CREATE INDEX IF NOT EXISTS idx_vocabulary_word ON vocabulary(word);
CREATE INDEX IF NOT EXISTS idx_kanji_jlpt ON kanji(jlpt_level);
CREATE INDEX IF NOT EXISTS idx_grammar_jlpt ON grammar_points(jlpt_level);
CREATE INDEX IF NOT EXISTS idx_reviews_due ON reviews(due_date);
CREATE INDEX IF NOT EXISTS idx_reviews_item ON reviews(item_id, item_kind);
CREATE INDEX IF NOT EXISTS idx_history_review ON review_history(review_id);
CREATE INDEX IF NOT EXISTS idx_history_date ON review_history(reviewed_at);
"#;

const V2_TABLES: &str = r#"
-- FSRS state per MCQ card, independent of flashcard reviews
CREATE TABLE IF NOT EXISTS mcq_reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL,
    item_kind TEXT NOT NULL,
    fsrs_card_state TEXT NOT NULL,
    due_date TEXT NOT NULL,
    last_reviewed TEXT,
    review_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(item_id, item_kind)
);

-- Append-only MCQ answer log
CREATE TABLE IF NOT EXISTS mcq_review_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    review_id INTEGER NOT NULL,
    selected_option INTEGER NOT NULL,      -- 0=A .. 3=D
    is_correct INTEGER NOT NULL,           -- 1 or 0
    duration_ms INTEGER,
    reviewed_at TEXT NOT NULL,
    FOREIGN KEY (review_id) REFERENCES mcq_reviews(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_mcq_reviews_due ON mcq_reviews(due_date);
CREATE INDEX IF NOT EXISTS idx_mcq_reviews_item ON mcq_reviews(item_id, item_kind);
CREATE INDEX IF NOT EXISTS idx_mcq_history_review ON mcq_review_history(review_id);
CREATE INDEX IF NOT EXISTS idx_mcq_history_date ON mcq_review_history(reviewed_at);
"#;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL,
            description TEXT
        );
        "#,
    )?;

    let current = schema_version(conn)?;

    if current < 1 {
        conn.execute_batch(V1_TABLES)?;
        conn.execute_batch(V1_INDEXES)?;
        record_version(conn, 1, "base catalog, review, and progress schema")?;
    }
    if current < 2 {
        conn.execute_batch(V2_TABLES)?;
        record_version(conn, 2, "MCQ review tables")?;
    }

    Ok(())
}

/// Highest applied schema version; 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        params![version, Utc::now().to_rfc3339(), description],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn migrations_are_idempotent_and_reach_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn all_tables_exist_after_migration() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        for table in [
            "vocabulary",
            "kanji",
            "grammar_points",
            "reviews",
            "review_history",
            "mcq_reviews",
            "mcq_review_history",
            "progress",
            "schema_version",
        ] {
            assert!(tables.iter().any(|t| t == table), "missing table {}", table);
        }
    }
}

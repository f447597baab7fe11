//! Test utilities for database setup.
//!
//! Provides helpers that reuse the authoritative schema initialization,
//! eliminating schema duplication in test code.

use std::sync::MutexGuard;

use chrono::Utc;
use rusqlite::Connection;
use tempfile::TempDir;

use crate::db::{self, DbPool};
use crate::domain::{JlptLevel, KanjiItem, Language, Meanings, VocabItem};

/// A file-backed test database with the full schema applied.
///
/// File-backed rather than in-memory so tests exercise the same journal
/// and locking paths as production; the directory is removed on drop.
pub struct TestDb {
    _temp: TempDir,
    pool: DbPool,
}

impl TestDb {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let pool = db::init_db(&temp.path().join("japanese.db")).expect("init test db");
        Self { _temp: temp, pool }
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.pool.lock().expect("test db lock")
    }
}

impl Default for TestDb {
    fn default() -> Self {
        Self::new()
    }
}

fn meanings_of(vi: &[&str], en: &[&str]) -> Meanings {
    let mut meanings = Meanings::new();
    if !vi.is_empty() {
        meanings.insert(Language::Vi, vi.iter().map(|s| s.to_string()).collect());
    }
    if !en.is_empty() {
        meanings.insert(Language::En, en.iter().map(|s| s.to_string()).collect());
    }
    meanings
}

/// Vocabulary item ready for `insert_vocab`; the id is assigned on insert.
pub fn vocab_fixture(
    word: &str,
    reading: &str,
    vi: &[&str],
    en: &[&str],
    jlpt_level: Option<JlptLevel>,
) -> VocabItem {
    VocabItem {
        id: 0,
        word: word.to_string(),
        reading: reading.to_string(),
        meanings: meanings_of(vi, en),
        sino_vietnamese: None,
        jlpt_level,
        part_of_speech: None,
        tags: Vec::new(),
        notes: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Kanji item ready for `insert_kanji`; the id is assigned on insert.
pub fn kanji_fixture(
    character: &str,
    on_readings: &[&str],
    vi: &[&str],
    en: &[&str],
    jlpt_level: Option<JlptLevel>,
) -> KanjiItem {
    KanjiItem {
        id: 0,
        character: character.to_string(),
        on_readings: on_readings.iter().map(|s| s.to_string()).collect(),
        kun_readings: Vec::new(),
        meanings: meanings_of(vi, en),
        sino_vietnamese: None,
        jlpt_level,
        stroke_count: None,
        radical: None,
        notes: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

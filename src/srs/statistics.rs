//! Read-only statistics over the review logs and catalog.
//!
//! Everything here is derived from append-only history scans and the
//! denormalized review rows; nothing is cached or written back. Date
//! ranges are inclusive on the UTC calendar date of `reviewed_at`.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;

use crate::db::{self, DateRange};
use crate::domain::{ItemKind, JlptLevel};
use crate::error::Result;

pub use crate::db::reviews::MostReviewed;

/// Cards at or above this stability count as mastered.
pub const MASTERY_STABILITY_THRESHOLD_DAYS: f64 = 21.0;

/// Catalog counts per JLPT level for one kind.
#[derive(Debug, Clone, Default)]
pub struct LevelCounts {
    pub by_level: BTreeMap<JlptLevel, i64>,
    pub untagged: i64,
    pub total: i64,
}

impl LevelCounts {
    pub fn level(&self, level: JlptLevel) -> i64 {
        self.by_level.get(&level).copied().unwrap_or(0)
    }
}

/// Mastered review counts, split by kind.
#[derive(Debug, Clone, Default)]
pub struct MasteredCounts {
    pub vocab: i64,
    pub kanji: i64,
    pub total: i64,
}

/// MCQ totals for one slice of the history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct McqTypeStats {
    pub total: i64,
    pub correct: i64,
    /// Percentage in [0, 100]; 0 when there is no history.
    pub accuracy: f64,
}

/// MCQ accuracy broken down by item kind.
#[derive(Debug, Clone, Default)]
pub struct McqStatsByType {
    pub vocab: McqTypeStats,
    pub kanji: McqTypeStats,
    pub overall: McqTypeStats,
}

pub fn vocab_count_by_level(conn: &Connection) -> Result<LevelCounts> {
    count_by_level(conn, ItemKind::Vocab)
}

pub fn kanji_count_by_level(conn: &Connection) -> Result<LevelCounts> {
    count_by_level(conn, ItemKind::Kanji)
}

fn count_by_level(conn: &Connection, kind: ItemKind) -> Result<LevelCounts> {
    let mut counts = LevelCounts::default();
    for level in JlptLevel::all() {
        counts.by_level.insert(level, 0);
    }
    for (level, count) in db::catalog::count_by_level(conn, kind)? {
        match level {
            Some(level) => {
                counts.by_level.insert(level, count);
            }
            None => counts.untagged = count,
        }
        counts.total += count;
    }
    Ok(counts)
}

/// Reviews whose card stability has reached the mastery threshold.
pub fn mastered(
    conn: &Connection,
    item_kind: Option<ItemKind>,
    jlpt_level: Option<JlptLevel>,
) -> Result<MasteredCounts> {
    let mut counts = MasteredCounts::default();
    if item_kind.is_none() || item_kind == Some(ItemKind::Vocab) {
        counts.vocab = db::reviews::mastered_count(
            conn,
            ItemKind::Vocab,
            jlpt_level,
            MASTERY_STABILITY_THRESHOLD_DAYS,
        )?;
    }
    if item_kind.is_none() || item_kind == Some(ItemKind::Kanji) {
        counts.kanji = db::reviews::mastered_count(
            conn,
            ItemKind::Kanji,
            jlpt_level,
            MASTERY_STABILITY_THRESHOLD_DAYS,
        )?;
    }
    counts.total = counts.vocab + counts.kanji;
    Ok(counts)
}

/// Percentage of flashcard reviews rated Good or Easy; 0 with no history.
pub fn retention_rate(conn: &Connection, range: DateRange) -> Result<f64> {
    let counts = db::reviews::rating_counts(conn, range)?;
    let total: i64 = counts.iter().sum();
    if total == 0 {
        return Ok(0.0);
    }
    let retained = counts[2] + counts[3];
    Ok(round1(retained as f64 / total as f64 * 100.0))
}

/// Mean duration of timed flashcard reviews, in milliseconds; 0 with none.
pub fn avg_review_duration_ms(conn: &Connection, range: DateRange) -> Result<f64> {
    Ok(db::reviews::avg_duration_ms(conn, range)?.unwrap_or(0.0))
}

/// Daily flashcard review counts, ascending by date. When both range
/// bounds are given, dates without reviews appear with a zero count.
pub fn daily_review_counts(
    conn: &Connection,
    range: DateRange,
) -> Result<Vec<(NaiveDate, i64)>> {
    let counted = db::reviews::daily_counts(conn, range)?;

    let (Some(start), Some(end)) = (range.start, range.end) else {
        return Ok(counted);
    };

    let by_date: BTreeMap<NaiveDate, i64> = counted.into_iter().collect();
    let mut filled = Vec::new();
    let mut date = start;
    while date <= end {
        filled.push((date, by_date.get(&date).copied().unwrap_or(0)));
        date += Duration::days(1);
    }
    Ok(filled)
}

/// Top items by lifetime flashcard review count.
pub fn most_reviewed(
    conn: &Connection,
    limit: usize,
    item_kind: Option<ItemKind>,
) -> Result<Vec<MostReviewed>> {
    db::reviews::most_reviewed(conn, limit, item_kind)
}

/// Percentage of MCQ answers that were correct; 0 with no history.
pub fn mcq_accuracy_rate(
    conn: &Connection,
    range: DateRange,
    item_kind: Option<ItemKind>,
    jlpt_level: Option<JlptLevel>,
) -> Result<f64> {
    let (total, correct) = db::mcq::answer_counts(conn, range, item_kind, jlpt_level)?;
    if total == 0 {
        return Ok(0.0);
    }
    Ok(round2(correct as f64 / total as f64 * 100.0))
}

/// MCQ totals and accuracy per item kind plus the overall roll-up.
pub fn mcq_stats_by_type(conn: &Connection, range: DateRange) -> Result<McqStatsByType> {
    let type_stats = |kind: Option<ItemKind>| -> Result<McqTypeStats> {
        let (total, correct) = db::mcq::answer_counts(conn, range, kind, None)?;
        let accuracy = if total == 0 {
            0.0
        } else {
            round2(correct as f64 / total as f64 * 100.0)
        };
        Ok(McqTypeStats {
            total,
            correct,
            accuracy,
        })
    };

    Ok(McqStatsByType {
        vocab: type_stats(Some(ItemKind::Vocab))?,
        kanji: type_stats(Some(ItemKind::Kanji))?,
        overall: type_stats(None)?,
    })
}

/// How often each option position (index 0 = A .. 3 = D) was selected.
/// A heavy skew means the user is pattern-guessing rather than recalling.
pub fn mcq_option_distribution(conn: &Connection, range: DateRange) -> Result<[i64; 4]> {
    db::mcq::option_distribution(conn, range)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

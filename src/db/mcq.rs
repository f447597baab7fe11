//! MCQ review rows and answer history.
//!
//! Mirrors the flashcard tables with an independent FSRS card per item, so
//! multiple-choice practice never disturbs free-recall scheduling. The
//! history additionally records which option the user picked, which feeds
//! the positional-bias statistics.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use super::reviews::{count_reviews_in, due_reviews_in, row_to_review};
use super::{parse_instant, DateRange};
use crate::domain::{Card, ItemKind, JlptLevel, McqHistoryEntry, ReviewRecord};
use crate::error::{Error, Result};

const REVIEW_COLUMNS: &str = r#"
    id, item_id, item_kind, fsrs_card_state, due_date,
    last_reviewed, review_count, created_at, updated_at
"#;

/// Insert a fresh MCQ review row. Fails with `Conflict` when the item
/// already has one.
pub fn create_review(
    conn: &Connection,
    item_id: i64,
    item_kind: ItemKind,
    card: &Card,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"
        INSERT INTO mcq_reviews (item_id, item_kind, fsrs_card_state, due_date,
                                 last_reviewed, review_count, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, NULL, 0, ?5, ?5)
        "#,
        params![
            item_id,
            item_kind.as_str(),
            card.to_json()?,
            card.due.to_rfc3339(),
            now,
        ],
    )
    .map_err(|e| Error::from_sqlite(e, "mcq review"))?;
    Ok(conn.last_insert_rowid())
}

pub fn get_review_by_id(conn: &Connection, review_id: i64) -> Result<Option<ReviewRecord>> {
    let sql = format!("SELECT {} FROM mcq_reviews WHERE id = ?1", REVIEW_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![review_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_review(row)?)),
        None => Ok(None),
    }
}

pub fn get_review_by_item(
    conn: &Connection,
    item_id: i64,
    item_kind: ItemKind,
) -> Result<Option<ReviewRecord>> {
    let sql = format!(
        "SELECT {} FROM mcq_reviews WHERE item_id = ?1 AND item_kind = ?2",
        REVIEW_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![item_id, item_kind.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_review(row)?)),
        None => Ok(None),
    }
}

/// Write the post-answer state. Runs inside the caller's transaction.
pub fn update_review_after_apply(
    conn: &Connection,
    review_id: i64,
    card: &Card,
    now: DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        r#"
        UPDATE mcq_reviews
        SET fsrs_card_state = ?2, due_date = ?3, last_reviewed = ?4,
            review_count = review_count + 1, updated_at = ?4
        WHERE id = ?1
        "#,
        params![
            review_id,
            card.to_json()?,
            card.due.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )?;
    if changed == 0 {
        return Err(Error::NotFound(format!("mcq review {}", review_id)));
    }
    Ok(())
}

pub fn due_reviews(
    conn: &Connection,
    as_of: DateTime<Utc>,
    limit: Option<usize>,
    jlpt_level: Option<JlptLevel>,
    item_kind: Option<ItemKind>,
) -> Result<Vec<ReviewRecord>> {
    due_reviews_in(conn, "mcq_reviews", as_of, limit, jlpt_level, item_kind)
}

pub fn count_reviews(
    conn: &Connection,
    jlpt_level: Option<JlptLevel>,
    item_kind: Option<ItemKind>,
) -> Result<i64> {
    count_reviews_in(conn, "mcq_reviews", jlpt_level, item_kind)
}

pub fn insert_history(
    conn: &Connection,
    review_id: i64,
    selected_option: u8,
    is_correct: bool,
    duration_ms: Option<i64>,
    reviewed_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO mcq_review_history (review_id, selected_option, is_correct,
                                        duration_ms, reviewed_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            review_id,
            selected_option,
            is_correct as i64,
            duration_ms,
            reviewed_at.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::from_sqlite(e, "mcq_review_history"))?;
    Ok(conn.last_insert_rowid())
}

/// History for one MCQ review, oldest first.
pub fn history_for_review(conn: &Connection, review_id: i64) -> Result<Vec<McqHistoryEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, review_id, selected_option, is_correct, duration_ms, reviewed_at
        FROM mcq_review_history
        WHERE review_id = ?1
        ORDER BY id ASC
        "#,
    )?;
    let mut rows = stmt.query(params![review_id])?;
    let mut history = Vec::new();
    while let Some(row) = rows.next()? {
        let is_correct: i64 = row.get(3)?;
        let reviewed_at: String = row.get(5)?;
        history.push(McqHistoryEntry {
            id: row.get(0)?,
            review_id: row.get(1)?,
            selected_option: row.get(2)?,
            is_correct: is_correct != 0,
            duration_ms: row.get(4)?,
            reviewed_at: parse_instant(&reviewed_at, "reviewed_at")?,
        });
    }
    Ok(history)
}

/// Total and correct answer counts under the filters, for accuracy rates.
pub fn answer_counts(
    conn: &Connection,
    range: DateRange,
    item_kind: Option<ItemKind>,
    jlpt_level: Option<JlptLevel>,
) -> Result<(i64, i64)> {
    let (clause, mut args) = range.clause("h.reviewed_at");
    let mut sql = format!(
        "SELECT COUNT(*), COALESCE(SUM(h.is_correct), 0) \
         FROM mcq_review_history h JOIN mcq_reviews r ON h.review_id = r.id \
         WHERE 1=1{}",
        clause
    );

    if let Some(kind) = item_kind {
        sql.push_str(" AND r.item_kind = ?");
        args.push(Value::Text(kind.as_str().to_string()));
    }
    if let Some(level) = jlpt_level {
        sql.push_str(
            " AND ((r.item_kind = 'vocab' AND r.item_id IN (SELECT id FROM vocabulary WHERE jlpt_level = ?)) \
              OR (r.item_kind = 'kanji' AND r.item_id IN (SELECT id FROM kanji WHERE jlpt_level = ?)))",
        );
        args.push(Value::Text(level.as_str().to_string()));
        args.push(Value::Text(level.as_str().to_string()));
    }

    let counts = conn.query_row(&sql, params_from_iter(args), |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;
    Ok(counts)
}

/// How often each option position (0..=3) was selected in the range.
pub fn option_distribution(conn: &Connection, range: DateRange) -> Result<[i64; 4]> {
    let (clause, args) = range.clause("reviewed_at");
    let sql = format!(
        "SELECT selected_option, COUNT(*) FROM mcq_review_history WHERE 1=1{} \
         GROUP BY selected_option",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(args))?;
    let mut counts = [0i64; 4];
    while let Some(row) = rows.next()? {
        let option: i64 = row.get(0)?;
        let count: i64 = row.get(1)?;
        if (0..4).contains(&option) {
            counts[option as usize] = count;
        }
    }
    Ok(counts)
}

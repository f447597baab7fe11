//! Flashcard review rows, their append-only history, and the scan queries
//! statistics are built from.
//!
//! History rows are never updated or deleted; retention and timing
//! analyses depend on the log staying append-only.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use super::{parse_instant, parse_instant_lenient, DateRange};
use crate::domain::{Card, FlashHistoryEntry, ItemKind, JlptLevel, ReviewRecord};
use crate::error::{Error, Result};

const REVIEW_COLUMNS: &str = r#"
    id, item_id, item_kind, fsrs_card_state, due_date,
    last_reviewed, review_count, created_at, updated_at
"#;

/// Insert a fresh review row. Fails with `Conflict` when the item already
/// has a flashcard review.
pub fn create_review(
    conn: &Connection,
    item_id: i64,
    item_kind: ItemKind,
    card: &Card,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"
        INSERT INTO reviews (item_id, item_kind, fsrs_card_state, due_date,
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
    .map_err(|e| Error::from_sqlite(e, "review"))?;
    Ok(conn.last_insert_rowid())
}

pub fn get_review_by_id(conn: &Connection, review_id: i64) -> Result<Option<ReviewRecord>> {
    let sql = format!("SELECT {} FROM reviews WHERE id = ?1", REVIEW_COLUMNS);
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
        "SELECT {} FROM reviews WHERE item_id = ?1 AND item_kind = ?2",
        REVIEW_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![item_id, item_kind.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_review(row)?)),
        None => Ok(None),
    }
}

/// Write the post-review state: new card blob, denormalized due date,
/// bumped counters. Runs inside the caller's transaction.
pub fn update_review_after_apply(
    conn: &Connection,
    review_id: i64,
    card: &Card,
    now: DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        r#"
        UPDATE reviews
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
        return Err(Error::NotFound(format!("review {}", review_id)));
    }
    Ok(())
}

/// Reviews due at `as_of`, optionally filtered by JLPT level and kind,
/// ordered by ascending due date with ids breaking ties.
pub fn due_reviews(
    conn: &Connection,
    as_of: DateTime<Utc>,
    limit: Option<usize>,
    jlpt_level: Option<JlptLevel>,
    item_kind: Option<ItemKind>,
) -> Result<Vec<ReviewRecord>> {
    due_reviews_in(conn, "reviews", as_of, limit, jlpt_level, item_kind)
}

/// Count of review rows under the same filters as `due_reviews`, without
/// the due-date cutoff.
pub fn count_reviews(
    conn: &Connection,
    jlpt_level: Option<JlptLevel>,
    item_kind: Option<ItemKind>,
) -> Result<i64> {
    count_reviews_in(conn, "reviews", jlpt_level, item_kind)
}

/// Shared due-queue query for the flashcard and MCQ review tables. The
/// level filter needs the catalog join, so the query is a UNION of one
/// branch per kind.
pub(crate) fn due_reviews_in(
    conn: &Connection,
    table: &str,
    as_of: DateTime<Utc>,
    limit: Option<usize>,
    jlpt_level: Option<JlptLevel>,
    item_kind: Option<ItemKind>,
) -> Result<Vec<ReviewRecord>> {
    let mut branches = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    for (kind, catalog) in [(ItemKind::Vocab, "vocabulary"), (ItemKind::Kanji, "kanji")] {
        if item_kind.is_some() && item_kind != Some(kind) {
            continue;
        }
        let mut branch = format!(
            "SELECT r.id, r.item_id, r.item_kind, r.fsrs_card_state, r.due_date, \
             r.last_reviewed, r.review_count, r.created_at, r.updated_at \
             FROM {} r JOIN {} c ON r.item_id = c.id \
             WHERE r.item_kind = '{}' AND r.due_date <= ?",
            table,
            catalog,
            kind.as_str()
        );
        args.push(Value::Text(as_of.to_rfc3339()));
        if let Some(level) = jlpt_level {
            branch.push_str(" AND c.jlpt_level = ?");
            args.push(Value::Text(level.as_str().to_string()));
        }
        branches.push(branch);
    }

    let mut sql = format!(
        "SELECT * FROM ({}) ORDER BY due_date ASC, id ASC",
        branches.join(" UNION ALL ")
    );
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        args.push(Value::Integer(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(args))?;
    let mut reviews = Vec::new();
    while let Some(row) = rows.next()? {
        reviews.push(row_to_review(row)?);
    }
    Ok(reviews)
}

pub(crate) fn count_reviews_in(
    conn: &Connection,
    table: &str,
    jlpt_level: Option<JlptLevel>,
    item_kind: Option<ItemKind>,
) -> Result<i64> {
    let mut branches = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    for (kind, catalog) in [(ItemKind::Vocab, "vocabulary"), (ItemKind::Kanji, "kanji")] {
        if item_kind.is_some() && item_kind != Some(kind) {
            continue;
        }
        let mut branch = format!(
            "SELECT r.id FROM {} r JOIN {} c ON r.item_id = c.id WHERE r.item_kind = '{}'",
            table,
            catalog,
            kind.as_str()
        );
        if let Some(level) = jlpt_level {
            branch.push_str(" AND c.jlpt_level = ?");
            args.push(Value::Text(level.as_str().to_string()));
        }
        branches.push(branch);
    }

    let sql = format!(
        "SELECT COUNT(*) FROM ({})",
        branches.join(" UNION ALL ")
    );
    let count = conn.query_row(&sql, params_from_iter(args), |row| row.get(0))?;
    Ok(count)
}

pub fn insert_history(
    conn: &Connection,
    review_id: i64,
    rating: u8,
    duration_ms: Option<i64>,
    reviewed_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO review_history (review_id, rating, duration_ms, reviewed_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![review_id, rating, duration_ms, reviewed_at.to_rfc3339()],
    )
    .map_err(|e| Error::from_sqlite(e, "review_history"))?;
    Ok(conn.last_insert_rowid())
}

/// History for one review, oldest first (row order equals review order).
pub fn history_for_review(conn: &Connection, review_id: i64) -> Result<Vec<FlashHistoryEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, review_id, rating, duration_ms, reviewed_at
        FROM review_history
        WHERE review_id = ?1
        ORDER BY id ASC
        "#,
    )?;
    let mut rows = stmt.query(params![review_id])?;
    let mut history = Vec::new();
    while let Some(row) = rows.next()? {
        let reviewed_at: String = row.get(4)?;
        history.push(FlashHistoryEntry {
            id: row.get(0)?,
            review_id: row.get(1)?,
            rating: row.get(2)?,
            duration_ms: row.get(3)?,
            reviewed_at: parse_instant(&reviewed_at, "reviewed_at")?,
        });
    }
    Ok(history)
}

/// Counts of each rating (index 0 = Again .. 3 = Easy) in the range.
pub fn rating_counts(conn: &Connection, range: DateRange) -> Result<[i64; 4]> {
    let (clause, args) = range.clause("reviewed_at");
    let sql = format!(
        "SELECT rating, COUNT(*) FROM review_history WHERE 1=1{} GROUP BY rating",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(args))?;
    let mut counts = [0i64; 4];
    while let Some(row) = rows.next()? {
        let rating: i64 = row.get(0)?;
        let count: i64 = row.get(1)?;
        if (1..=4).contains(&rating) {
            counts[(rating - 1) as usize] = count;
        }
    }
    Ok(counts)
}

/// Mean duration over history rows that recorded one, in milliseconds.
pub fn avg_duration_ms(conn: &Connection, range: DateRange) -> Result<Option<f64>> {
    let (clause, args) = range.clause("reviewed_at");
    let sql = format!(
        "SELECT AVG(duration_ms) FROM review_history WHERE duration_ms IS NOT NULL{}",
        clause
    );
    let avg = conn.query_row(&sql, params_from_iter(args), |row| row.get(0))?;
    Ok(avg)
}

/// Review counts grouped by UTC calendar date, ascending.
pub fn daily_counts(conn: &Connection, range: DateRange) -> Result<Vec<(NaiveDate, i64)>> {
    let (clause, args) = range.clause("reviewed_at");
    let sql = format!(
        "SELECT DATE(reviewed_at), COUNT(*) FROM review_history WHERE 1=1{} \
         GROUP BY DATE(reviewed_at) ORDER BY DATE(reviewed_at) ASC",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(args))?;
    let mut counts = Vec::new();
    while let Some(row) = rows.next()? {
        let date: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        let date = date
            .parse::<NaiveDate>()
            .map_err(|e| Error::Integrity(format!("unparseable review date '{}': {}", date, e)))?;
        counts.push((date, count));
    }
    Ok(counts)
}

/// Item surface plus lifetime review count, most reviewed first.
#[derive(Debug, Clone)]
pub struct MostReviewed {
    pub item_id: i64,
    pub item_kind: ItemKind,
    pub surface: String,
    pub review_count: i64,
}

pub fn most_reviewed(
    conn: &Connection,
    limit: usize,
    item_kind: Option<ItemKind>,
) -> Result<Vec<MostReviewed>> {
    let mut branches = Vec::new();
    for (kind, catalog, surface) in [
        (ItemKind::Vocab, "vocabulary", "word"),
        (ItemKind::Kanji, "kanji", "character"),
    ] {
        if item_kind.is_some() && item_kind != Some(kind) {
            continue;
        }
        branches.push(format!(
            "SELECT r.item_id, r.item_kind, c.{} AS surface, r.review_count \
             FROM reviews r JOIN {} c ON r.item_id = c.id WHERE r.item_kind = '{}'",
            surface,
            catalog,
            kind.as_str()
        ));
    }

    let sql = format!(
        "SELECT * FROM ({}) ORDER BY review_count DESC LIMIT ?",
        branches.join(" UNION ALL ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![limit as i64])?;
    let mut top = Vec::new();
    while let Some(row) = rows.next()? {
        let kind: String = row.get(1)?;
        top.push(MostReviewed {
            item_id: row.get(0)?,
            item_kind: ItemKind::from_str(&kind)
                .ok_or_else(|| Error::Integrity(format!("unknown item kind '{}'", kind)))?,
            surface: row.get(2)?,
            review_count: row.get(3)?,
        });
    }
    Ok(top)
}

/// Reviews whose card stability has reached `threshold_days`, per kind and
/// optional level.
pub fn mastered_count(
    conn: &Connection,
    item_kind: ItemKind,
    jlpt_level: Option<JlptLevel>,
    threshold_days: f64,
) -> Result<i64> {
    let catalog = match item_kind {
        ItemKind::Vocab => "vocabulary",
        ItemKind::Kanji => "kanji",
    };
    let mut sql = format!(
        "SELECT COUNT(*) FROM reviews r JOIN {} c ON r.item_id = c.id \
         WHERE r.item_kind = '{}' \
         AND json_extract(r.fsrs_card_state, '$.stability') >= ?",
        catalog,
        item_kind.as_str()
    );
    let mut args: Vec<Value> = vec![Value::Real(threshold_days)];
    if let Some(level) = jlpt_level {
        sql.push_str(" AND c.jlpt_level = ?");
        args.push(Value::Text(level.as_str().to_string()));
    }
    let count = conn.query_row(&sql, params_from_iter(args), |row| row.get(0))?;
    Ok(count)
}

pub(crate) fn row_to_review(row: &rusqlite::Row) -> Result<ReviewRecord> {
    let kind: String = row.get(2)?;
    let blob: String = row.get(3)?;
    let due_date: String = row.get(4)?;
    let last_reviewed: Option<String> = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(ReviewRecord {
        id: row.get(0)?,
        item_id: row.get(1)?,
        item_kind: ItemKind::from_str(&kind)
            .ok_or_else(|| Error::Integrity(format!("unknown item kind '{}'", kind)))?,
        card: Card::from_json(&blob)?,
        due_date: parse_instant(&due_date, "due_date")?,
        last_reviewed: last_reviewed
            .map(|s| parse_instant(&s, "last_reviewed"))
            .transpose()?,
        review_count: row.get(6)?,
        created_at: parse_instant_lenient(&created_at),
        updated_at: parse_instant_lenient(&updated_at),
    })
}

//! Progress row persistence: levels, stats blob, milestones, streak.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};

use super::parse_instant_lenient;
use crate::domain::{JlptLevel, Progress, ProgressStats};
use crate::error::{Error, Result};

const PROGRESS_COLUMNS: &str = r#"
    id, user_id, current_level, target_level, stats, milestones,
    streak_days, last_review_date, created_at, updated_at
"#;

pub fn get_progress(conn: &Connection, user_id: &str) -> Result<Option<Progress>> {
    let sql = format!("SELECT {} FROM progress WHERE user_id = ?1", PROGRESS_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![user_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_progress(row)?)),
        None => Ok(None),
    }
}

/// Create the singleton progress row for a user.
pub fn init_progress(
    conn: &Connection,
    user_id: &str,
    current_level: JlptLevel,
    target_level: JlptLevel,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    let stats = serde_json::to_string(&ProgressStats::default())
        .map_err(|e| Error::Invalid(format!("stats serialization failed: {}", e)))?;
    conn.execute(
        r#"
        INSERT INTO progress (user_id, current_level, target_level, stats, milestones,
                              streak_days, last_review_date, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, '[]', 0, NULL, ?5, ?5)
        "#,
        params![
            user_id,
            current_level.as_str(),
            target_level.as_str(),
            stats,
            now,
        ],
    )
    .map_err(|e| Error::from_sqlite(e, "progress"))?;
    Ok(conn.last_insert_rowid())
}

/// Fetch the user's progress, creating a default N5 row on first use.
pub fn get_or_init(conn: &Connection, user_id: &str) -> Result<Progress> {
    if let Some(progress) = get_progress(conn, user_id)? {
        return Ok(progress);
    }
    init_progress(conn, user_id, JlptLevel::N5, JlptLevel::N5)?;
    get_progress(conn, user_id)?
        .ok_or_else(|| Error::Integrity(format!("progress row vanished for '{}'", user_id)))
}

/// Persist every mutable progress field. Runs inside the caller's
/// transaction when invoked from an apply.
pub fn save_progress(conn: &Connection, progress: &Progress) -> Result<()> {
    let stats = serde_json::to_string(&progress.stats)
        .map_err(|e| Error::Invalid(format!("stats serialization failed: {}", e)))?;
    let milestones = serde_json::to_string(&progress.milestones)
        .map_err(|e| Error::Invalid(format!("milestones serialization failed: {}", e)))?;
    let changed = conn.execute(
        r#"
        UPDATE progress
        SET current_level = ?2, target_level = ?3, stats = ?4, milestones = ?5,
            streak_days = ?6, last_review_date = ?7, updated_at = ?8
        WHERE user_id = ?1
        "#,
        params![
            progress.user_id,
            progress.current_level.as_str(),
            progress.target_level.as_str(),
            stats,
            milestones,
            progress.streak_days,
            progress.last_review_date.map(|d| d.to_string()),
            Utc::now().to_rfc3339(),
        ],
    )?;
    if changed == 0 {
        return Err(Error::NotFound(format!("progress for '{}'", progress.user_id)));
    }
    Ok(())
}

/// Update current and/or target level without touching the rest.
pub fn set_levels(
    conn: &Connection,
    user_id: &str,
    current_level: Option<JlptLevel>,
    target_level: Option<JlptLevel>,
) -> Result<bool> {
    if current_level.is_none() && target_level.is_none() {
        return Ok(false);
    }

    let mut fields = Vec::new();
    let mut args: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(level) = current_level {
        fields.push("current_level = ?");
        args.push(rusqlite::types::Value::Text(level.as_str().to_string()));
    }
    if let Some(level) = target_level {
        fields.push("target_level = ?");
        args.push(rusqlite::types::Value::Text(level.as_str().to_string()));
    }
    fields.push("updated_at = ?");
    args.push(rusqlite::types::Value::Text(Utc::now().to_rfc3339()));
    args.push(rusqlite::types::Value::Text(user_id.to_string()));

    let sql = format!(
        "UPDATE progress SET {} WHERE user_id = ?",
        fields.join(", ")
    );
    let changed = conn.execute(&sql, rusqlite::params_from_iter(args))?;
    Ok(changed > 0)
}

fn row_to_progress(row: &rusqlite::Row) -> Result<Progress> {
    let current: String = row.get(2)?;
    let target: String = row.get(3)?;
    let stats_blob: String = row.get(4)?;
    let milestones_blob: Option<String> = row.get(5)?;
    let last_review_date: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Progress {
        id: row.get(0)?,
        user_id: row.get(1)?,
        current_level: JlptLevel::from_str(&current)
            .ok_or_else(|| Error::Integrity(format!("unknown JLPT level '{}'", current)))?,
        target_level: JlptLevel::from_str(&target)
            .ok_or_else(|| Error::Integrity(format!("unknown JLPT level '{}'", target)))?,
        stats: serde_json::from_str(&stats_blob)
            .map_err(|e| Error::Integrity(format!("corrupt stats blob: {}", e)))?,
        milestones: match milestones_blob {
            Some(blob) if !blob.is_empty() => serde_json::from_str(&blob)
                .map_err(|e| Error::Integrity(format!("corrupt milestones blob: {}", e)))?,
            _ => Vec::new(),
        },
        streak_days: row.get(6)?,
        last_review_date: last_review_date
            .map(|s| {
                s.parse::<NaiveDate>()
                    .map_err(|e| Error::Integrity(format!("unparseable review date '{}': {}", s, e)))
            })
            .transpose()?,
        created_at: parse_instant_lenient(&created_at),
        updated_at: parse_instant_lenient(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestDb;

    #[test]
    fn get_or_init_creates_a_default_row_once() {
        let db = TestDb::new();
        let conn = db.conn();

        let first = get_or_init(&conn, "default").unwrap();
        assert_eq!(first.current_level, JlptLevel::N5);
        assert_eq!(first.streak_days, 0);
        assert!(first.last_review_date.is_none());

        let second = get_or_init(&conn, "default").unwrap();
        assert_eq!(second.id, first.id);
    }

    #[test]
    fn duplicate_init_is_a_conflict() {
        let db = TestDb::new();
        let conn = db.conn();
        init_progress(&conn, "default", JlptLevel::N5, JlptLevel::N3).unwrap();
        let err = init_progress(&conn, "default", JlptLevel::N5, JlptLevel::N3).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn save_round_trips_streak_and_milestones() {
        let db = TestDb::new();
        let conn = db.conn();
        let mut progress = get_or_init(&conn, "default").unwrap();

        progress.record_review_day("2025-03-01".parse().unwrap());
        progress.add_milestone("first review");
        progress.stats.total_reviews = 1;
        save_progress(&conn, &progress).unwrap();

        let stored = get_progress(&conn, "default").unwrap().unwrap();
        assert_eq!(stored.streak_days, 1);
        assert_eq!(stored.last_review_date, Some("2025-03-01".parse().unwrap()));
        assert_eq!(stored.milestones, vec!["first review".to_string()]);
        assert_eq!(stored.stats.total_reviews, 1);
    }

    #[test]
    fn set_levels_updates_only_what_was_given() {
        let db = TestDb::new();
        let conn = db.conn();
        get_or_init(&conn, "default").unwrap();

        assert!(set_levels(&conn, "default", None, Some(JlptLevel::N3)).unwrap());
        let stored = get_progress(&conn, "default").unwrap().unwrap();
        assert_eq!(stored.current_level, JlptLevel::N5);
        assert_eq!(stored.target_level, JlptLevel::N3);

        assert!(!set_levels(&conn, "default", None, None).unwrap());
    }
}

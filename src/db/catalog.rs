//! Catalog reads and writes for vocabulary and kanji.
//!
//! This is the thin read API the generator, schedulers, and statistics sit
//! on. List queries compose their filters conjunctively and never splice
//! values into SQL.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use super::parse_instant_lenient as parse_instant;
use crate::domain::{Item, ItemKind, JlptLevel, KanjiItem, Meanings, VocabItem};
use crate::error::{Error, Result};

/// Conjunctive filters for `list_items`. Radical and stroke-count filters
/// only apply to kanji; they are ignored for vocabulary.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub jlpt_level: Option<JlptLevel>,
    /// Vocabulary: reading starts with this. Kanji: an on-reading contains it.
    pub reading_prefix: Option<String>,
    /// Substring match anywhere in the meanings blob.
    pub meaning_substring: Option<String>,
    pub radical: Option<String>,
    /// Inclusive stroke-count bounds.
    pub stroke_count_range: Option<(u32, u32)>,
    pub exclude_ids: Vec<i64>,
    pub limit: Option<usize>,
    /// Sample in random order instead of by ascending id.
    pub random_order: bool,
}

impl ItemFilter {
    pub fn with_level(level: Option<JlptLevel>) -> Self {
        Self {
            jlpt_level: level,
            ..Self::default()
        }
    }
}

const VOCAB_SELECT: &str = r#"
    id, word, reading, meanings, sino_vietnamese, jlpt_level,
    part_of_speech, tags, notes, created_at, updated_at
"#;

const KANJI_SELECT: &str = r#"
    id, character, on_readings, kun_readings, meanings, sino_vietnamese,
    jlpt_level, stroke_count, radical, notes, created_at, updated_at
"#;

pub fn insert_vocab(conn: &Connection, item: &VocabItem) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"
        INSERT INTO vocabulary (word, reading, meanings, sino_vietnamese, jlpt_level,
                                part_of_speech, tags, notes, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        "#,
        params![
            item.word,
            item.reading,
            to_json(&item.meanings)?,
            item.sino_vietnamese,
            item.jlpt_level.map(|l| l.as_str()),
            item.part_of_speech,
            to_json(&item.tags)?,
            item.notes,
            now,
        ],
    )
    .map_err(|e| Error::from_sqlite(e, "vocabulary"))?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_kanji(conn: &Connection, item: &KanjiItem) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"
        INSERT INTO kanji (character, on_readings, kun_readings, meanings, sino_vietnamese,
                           jlpt_level, stroke_count, radical, notes, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
        "#,
        params![
            item.character,
            to_json(&item.on_readings)?,
            to_json(&item.kun_readings)?,
            to_json(&item.meanings)?,
            item.sino_vietnamese,
            item.jlpt_level.map(|l| l.as_str()),
            item.stroke_count,
            item.radical,
            item.notes,
            now,
        ],
    )
    .map_err(|e| Error::from_sqlite(e, "kanji"))?;
    Ok(conn.last_insert_rowid())
}

/// Full-row update; bumps `updated_at`.
pub fn update_vocab(conn: &Connection, item: &VocabItem) -> Result<bool> {
    let changed = conn
        .execute(
            r#"
            UPDATE vocabulary
            SET word = ?2, reading = ?3, meanings = ?4, sino_vietnamese = ?5,
                jlpt_level = ?6, part_of_speech = ?7, tags = ?8, notes = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
            params![
                item.id,
                item.word,
                item.reading,
                to_json(&item.meanings)?,
                item.sino_vietnamese,
                item.jlpt_level.map(|l| l.as_str()),
                item.part_of_speech,
                to_json(&item.tags)?,
                item.notes,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::from_sqlite(e, "vocabulary"))?;
    Ok(changed > 0)
}

/// Full-row update; bumps `updated_at`.
pub fn update_kanji(conn: &Connection, item: &KanjiItem) -> Result<bool> {
    let changed = conn
        .execute(
            r#"
            UPDATE kanji
            SET character = ?2, on_readings = ?3, kun_readings = ?4, meanings = ?5,
                sino_vietnamese = ?6, jlpt_level = ?7, stroke_count = ?8,
                radical = ?9, notes = ?10, updated_at = ?11
            WHERE id = ?1
            "#,
            params![
                item.id,
                item.character,
                to_json(&item.on_readings)?,
                to_json(&item.kun_readings)?,
                to_json(&item.meanings)?,
                item.sino_vietnamese,
                item.jlpt_level.map(|l| l.as_str()),
                item.stroke_count,
                item.radical,
                item.notes,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::from_sqlite(e, "kanji"))?;
    Ok(changed > 0)
}

pub fn get_vocab_by_id(conn: &Connection, id: i64) -> Result<Option<VocabItem>> {
    let sql = format!("SELECT {} FROM vocabulary WHERE id = ?1", VOCAB_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_vocab(row)?)),
        None => Ok(None),
    }
}

pub fn get_kanji_by_id(conn: &Connection, id: i64) -> Result<Option<KanjiItem>> {
    let sql = format!("SELECT {} FROM kanji WHERE id = ?1", KANJI_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_kanji(row)?)),
        None => Ok(None),
    }
}

pub fn get_kanji_by_character(conn: &Connection, character: &str) -> Result<Option<KanjiItem>> {
    let sql = format!("SELECT {} FROM kanji WHERE character = ?1", KANJI_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![character])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_kanji(row)?)),
        None => Ok(None),
    }
}

/// Fetch an item of either kind by id.
pub fn get_item(conn: &Connection, id: i64, kind: ItemKind) -> Result<Option<Item>> {
    match kind {
        ItemKind::Vocab => Ok(get_vocab_by_id(conn, id)?.map(Item::Vocab)),
        ItemKind::Kanji => Ok(get_kanji_by_id(conn, id)?.map(Item::Kanji)),
    }
}

/// List catalog items of one kind under conjunctive filters.
pub fn list_items(conn: &Connection, kind: ItemKind, filter: &ItemFilter) -> Result<Vec<Item>> {
    let mut sql = match kind {
        ItemKind::Vocab => format!("SELECT {} FROM vocabulary WHERE 1=1", VOCAB_SELECT),
        ItemKind::Kanji => format!("SELECT {} FROM kanji WHERE 1=1", KANJI_SELECT),
    };
    let mut args: Vec<Value> = Vec::new();

    if let Some(level) = filter.jlpt_level {
        sql.push_str(" AND jlpt_level = ?");
        args.push(Value::Text(level.as_str().to_string()));
    }
    if let Some(prefix) = &filter.reading_prefix {
        match kind {
            ItemKind::Vocab => {
                sql.push_str(" AND reading LIKE ? || '%'");
                args.push(Value::Text(prefix.clone()));
            }
            ItemKind::Kanji => {
                sql.push_str(" AND on_readings LIKE '%' || ? || '%'");
                args.push(Value::Text(prefix.clone()));
            }
        }
    }
    if let Some(substring) = &filter.meaning_substring {
        sql.push_str(" AND meanings LIKE '%' || ? || '%'");
        args.push(Value::Text(substring.clone()));
    }
    if kind == ItemKind::Kanji {
        if let Some(radical) = &filter.radical {
            sql.push_str(" AND radical = ?");
            args.push(Value::Text(radical.clone()));
        }
        if let Some((lo, hi)) = filter.stroke_count_range {
            sql.push_str(" AND stroke_count BETWEEN ? AND ?");
            args.push(Value::Integer(lo as i64));
            args.push(Value::Integer(hi as i64));
        }
    }
    if !filter.exclude_ids.is_empty() {
        let placeholders = vec!["?"; filter.exclude_ids.len()].join(", ");
        sql.push_str(&format!(" AND id NOT IN ({})", placeholders));
        for id in &filter.exclude_ids {
            args.push(Value::Integer(*id));
        }
    }

    sql.push_str(if filter.random_order {
        " ORDER BY RANDOM()"
    } else {
        " ORDER BY id ASC"
    });
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        args.push(Value::Integer(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(args))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(match kind {
            ItemKind::Vocab => Item::Vocab(row_to_vocab(row)?),
            ItemKind::Kanji => Item::Kanji(row_to_kanji(row)?),
        });
    }
    Ok(items)
}

/// Item counts per JLPT level for one kind, plus the untagged remainder
/// under `None`.
pub fn count_by_level(
    conn: &Connection,
    kind: ItemKind,
) -> Result<Vec<(Option<JlptLevel>, i64)>> {
    let table = match kind {
        ItemKind::Vocab => "vocabulary",
        ItemKind::Kanji => "kanji",
    };
    let sql = format!(
        "SELECT jlpt_level, COUNT(*) FROM {} GROUP BY jlpt_level",
        table
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut counts = Vec::new();
    while let Some(row) = rows.next()? {
        let level: Option<String> = row.get(0)?;
        let count: i64 = row.get(1)?;
        counts.push((level.as_deref().and_then(JlptLevel::from_str), count));
    }
    Ok(counts)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Invalid(format!("catalog blob serialization failed: {}", e)))
}

fn parse_json_column<T: serde::de::DeserializeOwned>(blob: &str, column: &str) -> Result<T> {
    serde_json::from_str(blob)
        .map_err(|e| Error::Integrity(format!("corrupt {} blob: {}", column, e)))
}

fn row_to_vocab(row: &rusqlite::Row) -> Result<VocabItem> {
    let meanings_blob: String = row.get(3)?;
    let level: Option<String> = row.get(5)?;
    let tags_blob: Option<String> = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(VocabItem {
        id: row.get(0)?,
        word: row.get(1)?,
        reading: row.get(2)?,
        meanings: parse_json_column::<Meanings>(&meanings_blob, "meanings")?,
        sino_vietnamese: row.get(4)?,
        jlpt_level: level.as_deref().and_then(JlptLevel::from_str),
        part_of_speech: row.get(6)?,
        tags: match tags_blob {
            Some(blob) => parse_json_column(&blob, "tags")?,
            None => Vec::new(),
        },
        notes: row.get(8)?,
        created_at: parse_instant(&created_at),
        updated_at: parse_instant(&updated_at),
    })
}

fn row_to_kanji(row: &rusqlite::Row) -> Result<KanjiItem> {
    let on_blob: String = row.get(2)?;
    let kun_blob: String = row.get(3)?;
    let meanings_blob: String = row.get(4)?;
    let level: Option<String> = row.get(6)?;
    let stroke_count: Option<i64> = row.get(7)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(KanjiItem {
        id: row.get(0)?,
        character: row.get(1)?,
        on_readings: parse_json_column(&on_blob, "on_readings")?,
        kun_readings: parse_json_column(&kun_blob, "kun_readings")?,
        meanings: parse_json_column::<Meanings>(&meanings_blob, "meanings")?,
        sino_vietnamese: row.get(5)?,
        jlpt_level: level.as_deref().and_then(JlptLevel::from_str),
        stroke_count: stroke_count.map(|n| n as u32),
        radical: row.get(8)?,
        notes: row.get(9)?,
        created_at: parse_instant(&created_at),
        updated_at: parse_instant(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{kanji_fixture, vocab_fixture, TestDb};

    #[test]
    fn insert_and_fetch_vocab_round_trips() {
        let db = TestDb::new();
        let conn = db.conn();
        let item = vocab_fixture("単語", "たんご", &["từ vựng"], &["word"], Some(JlptLevel::N5));
        let id = insert_vocab(&conn, &item).unwrap();

        let fetched = get_vocab_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(fetched.word, "単語");
        assert_eq!(fetched.reading, "たんご");
        assert_eq!(
            fetched.meanings[&crate::domain::Language::Vi],
            vec!["từ vựng".to_string()]
        );
        assert_eq!(fetched.jlpt_level, Some(JlptLevel::N5));
    }

    #[test]
    fn duplicate_kanji_character_is_a_conflict() {
        let db = TestDb::new();
        let conn = db.conn();
        let item = kanji_fixture("語", &["ゴ"], &["ngữ"], &["word"], Some(JlptLevel::N5));
        insert_kanji(&conn, &item).unwrap();

        let err = insert_kanji(&conn, &item).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn list_items_composes_filters_conjunctively() {
        let db = TestDb::new();
        let conn = db.conn();
        insert_vocab(
            &conn,
            &vocab_fixture("水", "みず", &["nước"], &["water"], Some(JlptLevel::N5)),
        )
        .unwrap();
        insert_vocab(
            &conn,
            &vocab_fixture("未来", "みらい", &["tương lai"], &["future"], Some(JlptLevel::N4)),
        )
        .unwrap();
        insert_vocab(
            &conn,
            &vocab_fixture("火", "ひ", &["lửa"], &["fire"], Some(JlptLevel::N5)),
        )
        .unwrap();

        let filter = ItemFilter {
            jlpt_level: Some(JlptLevel::N5),
            reading_prefix: Some("み".to_string()),
            ..ItemFilter::default()
        };
        let items = list_items(&conn, ItemKind::Vocab, &filter).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].surface_display(), "水 (みず)");
    }

    #[test]
    fn list_items_excludes_ids_and_honors_limit() {
        let db = TestDb::new();
        let conn = db.conn();
        let mut ids = Vec::new();
        for (word, reading) in [("一", "いち"), ("二", "に"), ("三", "さん")] {
            ids.push(
                insert_vocab(
                    &conn,
                    &vocab_fixture(word, reading, &[], &["number"], Some(JlptLevel::N5)),
                )
                .unwrap(),
            );
        }

        let filter = ItemFilter {
            exclude_ids: vec![ids[0]],
            limit: Some(1),
            ..ItemFilter::default()
        };
        let items = list_items(&conn, ItemKind::Vocab, &filter).unwrap();
        assert_eq!(items.len(), 1);
        assert_ne!(items[0].id(), ids[0]);
    }

    #[test]
    fn kanji_stroke_and_radical_filters_apply() {
        let db = TestDb::new();
        let conn = db.conn();
        let mut base = kanji_fixture("語", &["ゴ"], &["ngữ"], &["word"], Some(JlptLevel::N5));
        base.stroke_count = Some(14);
        base.radical = Some("言".to_string());
        insert_kanji(&conn, &base).unwrap();

        let mut other = kanji_fixture("水", &["スイ"], &["thủy"], &["water"], Some(JlptLevel::N5));
        other.stroke_count = Some(4);
        other.radical = Some("水".to_string());
        insert_kanji(&conn, &other).unwrap();

        let filter = ItemFilter {
            stroke_count_range: Some((12, 16)),
            ..ItemFilter::default()
        };
        let items = list_items(&conn, ItemKind::Kanji, &filter).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].surface_display(), "語");

        let filter = ItemFilter {
            radical: Some("水".to_string()),
            ..ItemFilter::default()
        };
        let items = list_items(&conn, ItemKind::Kanji, &filter).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].surface_display(), "水");
    }

    #[test]
    fn update_vocab_bumps_updated_at() {
        let db = TestDb::new();
        let conn = db.conn();
        let item = vocab_fixture("犬", "いぬ", &["chó"], &["dog"], None);
        let id = insert_vocab(&conn, &item).unwrap();

        let mut stored = get_vocab_by_id(&conn, id).unwrap().unwrap();
        stored.notes = Some("common pet word".to_string());
        assert!(update_vocab(&conn, &stored).unwrap());

        let after = get_vocab_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(after.notes.as_deref(), Some("common pet word"));
        assert!(after.updated_at >= stored.updated_at);
    }

    #[test]
    fn count_by_level_groups_untagged_separately() {
        let db = TestDb::new();
        let conn = db.conn();
        insert_vocab(&conn, &vocab_fixture("水", "みず", &[], &["water"], Some(JlptLevel::N5)))
            .unwrap();
        insert_vocab(&conn, &vocab_fixture("火", "ひ", &[], &["fire"], Some(JlptLevel::N5)))
            .unwrap();
        insert_vocab(&conn, &vocab_fixture("犬", "いぬ", &[], &["dog"], None)).unwrap();

        let counts = count_by_level(&conn, ItemKind::Vocab).unwrap();
        let n5 = counts
            .iter()
            .find(|(l, _)| *l == Some(JlptLevel::N5))
            .map(|(_, c)| *c);
        let untagged = counts.iter().find(|(l, _)| l.is_none()).map(|(_, c)| *c);
        assert_eq!(n5, Some(2));
        assert_eq!(untagged, Some(1));
    }
}

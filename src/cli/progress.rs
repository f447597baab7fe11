//! Progress display, level changes, and the statistics report.

use chrono::{Duration, Utc};

use crate::config::MOST_REVIEWED_LIMIT;
use crate::db::{self, DateRange, DbPool};
use crate::domain::JlptLevel;
use crate::error::{Error, Result};
use crate::srs::scheduler::DEFAULT_USER;
use crate::srs::statistics;

pub fn show(pool: DbPool) -> Result<()> {
    let conn = db::try_lock(&pool)?;
    let progress = db::progress::get_or_init(&conn, DEFAULT_USER)?;

    let vocab = statistics::vocab_count_by_level(&conn)?;
    let kanji = statistics::kanji_count_by_level(&conn)?;
    let mastered = statistics::mastered(&conn, None, None)?;
    let due_flash = db::reviews::due_reviews(&conn, Utc::now(), None, None, None)?.len();
    let due_mcq = db::mcq::due_reviews(&conn, Utc::now(), None, None, None)?.len();

    println!("Current level: {}", progress.current_level.as_str().to_uppercase());
    println!("Target level:  {}", progress.target_level.as_str().to_uppercase());
    println!("Streak:        {} day(s)", progress.streak_days);
    if let Some(date) = progress.last_review_date {
        println!("Last review:   {}", date);
    }
    println!();
    println!("Vocabulary: {} total ({} mastered)", vocab.total, mastered.vocab);
    println!("Kanji:      {} total ({} mastered)", kanji.total, mastered.kanji);
    for level in JlptLevel::all() {
        println!(
            "  {}: {} vocab / {} kanji",
            level.as_str().to_uppercase(),
            vocab.level(level),
            kanji.level(level),
        );
    }
    println!();
    match (due_flash, due_mcq) {
        (0, 0) => println!("All caught up!"),
        _ => println!("Due now: {} flashcard(s), {} question(s)", due_flash, due_mcq),
    }
    Ok(())
}

pub fn set_level(pool: DbPool, level: JlptLevel, current: bool) -> Result<()> {
    let conn = db::try_lock(&pool)?;
    db::progress::get_or_init(&conn, DEFAULT_USER)?;

    let (current_level, target_level) = if current {
        (Some(level), None)
    } else {
        (None, Some(level))
    };
    if !db::progress::set_levels(&conn, DEFAULT_USER, current_level, target_level)? {
        return Err(Error::NotFound(format!("progress for '{}'", DEFAULT_USER)));
    }

    let which = if current { "current" } else { "target" };
    println!("Updated {} level to {}", which, level.as_str().to_uppercase());
    Ok(())
}

pub fn stats(pool: DbPool, range_arg: &str) -> Result<()> {
    let today = Utc::now().date_naive();
    let (range, label) = match range_arg {
        "7d" => (
            DateRange::between(today - Duration::days(6), today),
            "last 7 days",
        ),
        "30d" => (
            DateRange::between(today - Duration::days(29), today),
            "last 30 days",
        ),
        "all" => (DateRange::all(), "all time"),
        other => {
            return Err(Error::Invalid(format!(
                "unknown range '{}' (expected 7d, 30d, or all)",
                other
            )))
        }
    };

    let conn = db::try_lock(&pool)?;

    let retention = statistics::retention_rate(&conn, range)?;
    let avg_ms = statistics::avg_review_duration_ms(&conn, range)?;
    let daily = statistics::daily_review_counts(&conn, range)?;
    let total: i64 = daily.iter().map(|(_, count)| count).sum();

    println!("Statistics ({})", label);
    println!("  flashcard reviews: {}", total);
    println!("  retention rate:    {:.1}%", retention);
    println!("  avg time per card: {:.1}s", avg_ms / 1000.0);

    if !daily.is_empty() {
        println!("\nDaily activity:");
        for (date, count) in &daily {
            println!("  {}  {}", date, count);
        }
    }

    let top = statistics::most_reviewed(&conn, MOST_REVIEWED_LIMIT, None).unwrap_or_else(|e| {
        tracing::warn!("failed to load most-reviewed items: {}", e);
        Vec::new()
    });
    if !top.is_empty() {
        println!("\nMost reviewed:");
        for entry in top {
            println!(
                "  {}  ({}x, {})",
                entry.surface,
                entry.review_count,
                entry.item_kind.as_str()
            );
        }
    }

    let mcq = statistics::mcq_stats_by_type(&conn, range)?;
    if mcq.overall.total > 0 {
        println!("\nMCQ accuracy:");
        println!(
            "  vocab:   {}/{} ({:.1}%)",
            mcq.vocab.correct, mcq.vocab.total, mcq.vocab.accuracy
        );
        println!(
            "  kanji:   {}/{} ({:.1}%)",
            mcq.kanji.correct, mcq.kanji.total, mcq.kanji.accuracy
        );
        println!(
            "  overall: {}/{} ({:.1}%)",
            mcq.overall.correct, mcq.overall.total, mcq.overall.accuracy
        );

        let distribution = statistics::mcq_option_distribution(&conn, range)?;
        println!(
            "  options picked: A={} B={} C={} D={}",
            distribution[0], distribution[1], distribution[2], distribution[3]
        );
    }

    Ok(())
}

//! Interactive multiple-choice quiz session.

use std::time::Instant;

use crate::config::DEFAULT_SESSION_LIMIT;
use crate::db::{self, DbPool, ItemFilter};
use crate::domain::{ItemKind, JlptLevel, Language};
use crate::error::{Error, Result};
use crate::srs::{McqGenerator, McqScheduler, QuestionType};

const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Ensure every catalog item in scope has an MCQ review, so new imports
/// enter the quiz rotation without a separate enrollment step.
fn auto_create_reviews(
    pool: &DbPool,
    scheduler: &McqScheduler,
    kind: Option<ItemKind>,
    level: Option<JlptLevel>,
) -> Result<usize> {
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => vec![ItemKind::Vocab, ItemKind::Kanji],
    };

    let mut created = 0;
    for kind in kinds {
        let items = {
            let conn = db::try_lock(pool)?;
            db::catalog::list_items(&conn, kind, &ItemFilter::with_level(level))?
        };
        for item in items {
            let exists = {
                let conn = db::try_lock(pool)?;
                db::mcq::get_review_by_item(&conn, item.id(), kind)?.is_some()
            };
            if exists {
                continue;
            }
            match scheduler.create_review(item.id(), kind) {
                Ok(_) => created += 1,
                // Racing an earlier enrollment is fine.
                Err(Error::Conflict(_)) => {}
                Err(other) => return Err(other),
            }
        }
    }
    Ok(created)
}

pub fn run_session(
    pool: DbPool,
    limit: Option<usize>,
    level: Option<JlptLevel>,
    kind: Option<ItemKind>,
    question_type: QuestionType,
    language: Language,
) -> Result<()> {
    let mut scheduler = McqScheduler::new(pool.clone());
    let mut generator = McqGenerator::new(pool.clone());
    let limit = limit.unwrap_or(DEFAULT_SESSION_LIMIT);

    let created = auto_create_reviews(&pool, &scheduler, kind, level)?;
    if created > 0 {
        println!("Enrolled {} new item(s) for quizzing.", created);
    }

    let due = scheduler.due_reviews(Some(limit), level, kind)?;
    if due.is_empty() {
        println!("No questions due. Nice work!");
        return Ok(());
    }
    println!("{} question(s) due. Answer a-d, q to quit.\n", due.len());

    let mut answered = 0usize;
    let mut correct = 0usize;
    for record in due {
        let question = match generator.generate(
            record.item_id,
            record.item_kind,
            question_type,
            language,
        ) {
            Ok(question) => question,
            // Not enough unique options for this item; skip and move on.
            Err(Error::Unavailable(reason)) => {
                tracing::warn!(item_id = record.item_id, %reason, "skipping question");
                continue;
            }
            Err(other) => return Err(other),
        };

        println!("{}", question.prompt);
        for (label, option) in OPTION_LABELS.iter().zip(question.options.iter()) {
            println!("  {}. {}", label, option);
        }

        let started = Instant::now();
        let selected = loop {
            match super::read_line("  answer [a-d, q=quit]: ")? {
                None => break None,
                Some(input) if input.eq_ignore_ascii_case("q") => break None,
                Some(input) => {
                    let choice = input
                        .chars()
                        .next()
                        .and_then(|c| OPTION_LABELS.iter().position(|l| l.eq_ignore_ascii_case(&c)));
                    match choice {
                        Some(index) => break Some(index as u8),
                        None => println!("  please answer a, b, c, d, or q"),
                    }
                }
            }
        };
        let Some(selected) = selected else {
            break;
        };

        let is_correct = question.is_correct(selected as usize);
        if is_correct {
            correct += 1;
            println!("  Correct! {}", question.explanation);
        } else {
            println!(
                "  Wrong — the answer was {}. {}",
                OPTION_LABELS[question.correct_index], question.explanation
            );
        }

        let duration_ms = started.elapsed().as_millis() as i64;
        let updated = scheduler.apply(record.id, is_correct, selected, Some(duration_ms))?;
        println!("  next review: {}\n", updated.due_date.format("%Y-%m-%d %H:%M UTC"));
        answered += 1;
    }

    if answered > 0 {
        println!(
            "Session over: {}/{} correct ({:.0}%).",
            correct,
            answered,
            correct as f64 / answered as f64 * 100.0
        );
    } else {
        println!("Session over.");
    }
    Ok(())
}

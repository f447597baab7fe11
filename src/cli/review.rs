//! Interactive flashcard review session.

use std::time::Instant;

use crate::config::DEFAULT_SESSION_LIMIT;
use crate::db::{self, DbPool};
use crate::domain::{Item, ItemKind, JlptLevel, Language};
use crate::error::Result;
use crate::srs::FlashcardScheduler;

use super::read_line;

pub fn run_session(
    pool: DbPool,
    limit: Option<usize>,
    level: Option<JlptLevel>,
    kind: Option<ItemKind>,
) -> Result<()> {
    let mut scheduler = FlashcardScheduler::new(pool.clone());
    let limit = limit.unwrap_or(DEFAULT_SESSION_LIMIT);

    let due = scheduler.due_reviews(Some(limit), level, kind)?;
    if due.is_empty() {
        println!("No cards due. Nice work!");
        return Ok(());
    }
    println!("{} card(s) due. Enter to reveal, 1-4 to rate, q to quit.\n", due.len());

    let mut done = 0usize;
    for record in due {
        let item = {
            let conn = db::try_lock(&pool)?;
            db::catalog::get_item(&conn, record.item_id, record.item_kind)?
        };
        let Some(item) = item else {
            tracing::warn!(
                item_id = record.item_id,
                kind = record.item_kind.as_str(),
                "review references a missing item; skipping"
            );
            continue;
        };

        println!("{}", front_text(&item));
        let started = Instant::now();
        if read_line("  (reveal) ")?.is_none() {
            break;
        }
        println!("  {}", back_text(&item));

        let rating = loop {
            match read_line("  rate [1=again 2=hard 3=good 4=easy, q=quit]: ")? {
                None => break None,
                Some(input) if input.eq_ignore_ascii_case("q") => break None,
                Some(input) => match input.parse::<u8>() {
                    Ok(value @ 1..=4) => break Some(value),
                    _ => println!("  please enter 1-4 or q"),
                },
            }
        };
        let Some(rating) = rating else {
            break;
        };

        let duration_ms = started.elapsed().as_millis() as i64;
        let updated = scheduler.apply(record.id, rating, Some(duration_ms))?;
        println!("  next review: {}\n", updated.due_date.format("%Y-%m-%d %H:%M UTC"));
        done += 1;
    }

    println!("Session over: {} card(s) reviewed.", done);
    Ok(())
}

fn front_text(item: &Item) -> String {
    match item {
        Item::Vocab(v) => format!("【{}】", v.word),
        Item::Kanji(k) => format!("【{}】", k.character),
    }
}

fn back_text(item: &Item) -> String {
    let meanings = item
        .primary_meaning(Language::Vi)
        .unwrap_or("(no meaning recorded)");
    match item {
        Item::Vocab(v) => format!("{} — {}", v.reading, meanings),
        Item::Kanji(k) => {
            let on = k.on_readings.join("、");
            let kun = k.kun_readings.join("、");
            format!("on: {} / kun: {} — {}", on, kun, meanings)
        }
    }
}

//! Flashcard review scheduler.
//!
//! Coordinates the catalog, the review store, and the FSRS engine. Each
//! applied review updates the card, appends a history row, and folds the
//! day into the study streak inside one transaction, so a failure at any
//! step leaves no partial state behind.

use chrono::{DateTime, Utc};

use crate::db::{self, DbPool};
use crate::domain::{ItemKind, JlptLevel, Rating, ReviewRecord};
use crate::error::{Error, Result};

use super::engine::FsrsEngine;

pub const DEFAULT_USER: &str = "default";

pub struct FlashcardScheduler {
    pool: DbPool,
    engine: FsrsEngine,
    user_id: String,
}

impl FlashcardScheduler {
    pub fn new(pool: DbPool) -> Self {
        Self::with_engine(pool, FsrsEngine::new())
    }

    /// Scheduler with a custom engine (retention target, steps, fuzzing).
    pub fn with_engine(pool: DbPool, engine: FsrsEngine) -> Self {
        Self {
            pool,
            engine,
            user_id: DEFAULT_USER.to_string(),
        }
    }

    /// Start tracking an item: a fresh Learning card, due immediately.
    ///
    /// Fails with `NotFound` if the item does not exist and `Conflict` if
    /// it already has a flashcard review.
    pub fn create_review(&self, item_id: i64, item_kind: ItemKind) -> Result<i64> {
        let conn = db::try_lock(&self.pool)?;

        if db::catalog::get_item(&conn, item_id, item_kind)?.is_none() {
            return Err(Error::NotFound(format!(
                "{} item {}",
                item_kind.as_str(),
                item_id
            )));
        }

        let card = self.engine.create_card(Utc::now());
        let review_id = db::reviews::create_review(&conn, item_id, item_kind, &card)?;
        tracing::debug!(review_id, item_id, kind = item_kind.as_str(), "created flashcard review");
        Ok(review_id)
    }

    /// Reviews due now, ascending by due date (ids break ties). Filters
    /// compose conjunctively; `limit` truncates after filtering.
    pub fn due_reviews(
        &self,
        limit: Option<usize>,
        jlpt_level: Option<JlptLevel>,
        item_kind: Option<ItemKind>,
    ) -> Result<Vec<ReviewRecord>> {
        self.due_reviews_at(limit, jlpt_level, item_kind, Utc::now())
    }

    /// `due_reviews` with an explicit cutoff instant.
    pub fn due_reviews_at(
        &self,
        limit: Option<usize>,
        jlpt_level: Option<JlptLevel>,
        item_kind: Option<ItemKind>,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<ReviewRecord>> {
        let conn = db::try_lock(&self.pool)?;
        db::reviews::due_reviews(&conn, as_of, limit, jlpt_level, item_kind)
    }

    pub fn review_by_item(&self, item_id: i64, item_kind: ItemKind) -> Result<ReviewRecord> {
        let conn = db::try_lock(&self.pool)?;
        db::reviews::get_review_by_item(&conn, item_id, item_kind)?.ok_or_else(|| {
            Error::NotFound(format!(
                "flashcard review for {} item {}",
                item_kind.as_str(),
                item_id
            ))
        })
    }

    /// Apply a rating (1=Again .. 4=Easy) to a review.
    pub fn apply(
        &mut self,
        review_id: i64,
        rating: u8,
        duration_ms: Option<i64>,
    ) -> Result<ReviewRecord> {
        self.apply_at(review_id, rating, duration_ms, Utc::now())
    }

    /// `apply` with an explicit clock, for deterministic tests.
    pub fn apply_at(
        &mut self,
        review_id: i64,
        rating: u8,
        duration_ms: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord> {
        let rating = Rating::from_int(rating)?;

        let mut conn = db::try_lock(&self.pool)?;
        let tx = conn.transaction()?;

        let review = db::reviews::get_review_by_id(&tx, review_id)?
            .ok_or_else(|| Error::NotFound(format!("review {}", review_id)))?;

        let (card, log) = self.engine.review_card(&review.card, rating, now)?;
        db::reviews::update_review_after_apply(&tx, review_id, &card, now)?;
        db::reviews::insert_history(&tx, review_id, log.rating.as_int(), duration_ms, now)?;

        let mut progress = db::progress::get_or_init(&tx, &self.user_id)?;
        progress.record_review_day(now.date_naive());
        db::progress::save_progress(&tx, &progress)?;

        let updated = db::reviews::get_review_by_id(&tx, review_id)?
            .ok_or_else(|| Error::Integrity(format!("review {} vanished mid-apply", review_id)))?;

        tx.commit()?;
        tracing::debug!(
            review_id,
            rating = rating.as_int(),
            due = %updated.due_date,
            "applied flashcard review"
        );
        Ok(updated)
    }

    /// Count of tracked reviews under the filters.
    pub fn count(
        &self,
        jlpt_level: Option<JlptLevel>,
        item_kind: Option<ItemKind>,
    ) -> Result<i64> {
        let conn = db::try_lock(&self.pool)?;
        db::reviews::count_reviews(&conn, jlpt_level, item_kind)
    }
}

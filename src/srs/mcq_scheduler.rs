//! MCQ review scheduler.
//!
//! Same shape as the flashcard scheduler but over the MCQ tables, with
//! binary rating semantics: a correct answer schedules like Good, a wrong
//! one like Again. The two schedulers never read or write each other's
//! reviews, so an item can be due in one mode and not the other.

use chrono::{DateTime, Utc};

use crate::db::{self, DbPool};
use crate::domain::{ItemKind, JlptLevel, Rating, ReviewRecord};
use crate::error::{Error, Result};

use super::engine::FsrsEngine;
use super::scheduler::DEFAULT_USER;

pub struct McqScheduler {
    pool: DbPool,
    engine: FsrsEngine,
    user_id: String,
}

impl McqScheduler {
    pub fn new(pool: DbPool) -> Self {
        Self::with_engine(pool, FsrsEngine::new())
    }

    pub fn with_engine(pool: DbPool, engine: FsrsEngine) -> Self {
        Self {
            pool,
            engine,
            user_id: DEFAULT_USER.to_string(),
        }
    }

    /// Start MCQ practice for an item, independent of any flashcard review.
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
        let review_id = db::mcq::create_review(&conn, item_id, item_kind, &card)?;
        tracing::debug!(review_id, item_id, kind = item_kind.as_str(), "created MCQ review");
        Ok(review_id)
    }

    pub fn due_reviews(
        &self,
        limit: Option<usize>,
        jlpt_level: Option<JlptLevel>,
        item_kind: Option<ItemKind>,
    ) -> Result<Vec<ReviewRecord>> {
        self.due_reviews_at(limit, jlpt_level, item_kind, Utc::now())
    }

    pub fn due_reviews_at(
        &self,
        limit: Option<usize>,
        jlpt_level: Option<JlptLevel>,
        item_kind: Option<ItemKind>,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<ReviewRecord>> {
        let conn = db::try_lock(&self.pool)?;
        db::mcq::due_reviews(&conn, as_of, limit, jlpt_level, item_kind)
    }

    pub fn review_by_item(&self, item_id: i64, item_kind: ItemKind) -> Result<ReviewRecord> {
        let conn = db::try_lock(&self.pool)?;
        db::mcq::get_review_by_item(&conn, item_id, item_kind)?.ok_or_else(|| {
            Error::NotFound(format!(
                "MCQ review for {} item {}",
                item_kind.as_str(),
                item_id
            ))
        })
    }

    /// Apply an answered question: correctness drives the FSRS rating, the
    /// selected option position is kept for bias analysis.
    pub fn apply(
        &mut self,
        review_id: i64,
        is_correct: bool,
        selected_option: u8,
        duration_ms: Option<i64>,
    ) -> Result<ReviewRecord> {
        self.apply_at(review_id, is_correct, selected_option, duration_ms, Utc::now())
    }

    /// `apply` with an explicit clock, for deterministic tests.
    pub fn apply_at(
        &mut self,
        review_id: i64,
        is_correct: bool,
        selected_option: u8,
        duration_ms: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord> {
        if selected_option > 3 {
            return Err(Error::Invalid(format!(
                "selected_option must be 0-3 (0=A, 1=B, 2=C, 3=D), got {}",
                selected_option
            )));
        }
        let rating = if is_correct { Rating::Good } else { Rating::Again };

        let mut conn = db::try_lock(&self.pool)?;
        let tx = conn.transaction()?;

        let review = db::mcq::get_review_by_id(&tx, review_id)?
            .ok_or_else(|| Error::NotFound(format!("mcq review {}", review_id)))?;

        let (card, _log) = self.engine.review_card(&review.card, rating, now)?;
        db::mcq::update_review_after_apply(&tx, review_id, &card, now)?;
        db::mcq::insert_history(&tx, review_id, selected_option, is_correct, duration_ms, now)?;

        let mut progress = db::progress::get_or_init(&tx, &self.user_id)?;
        progress.record_review_day(now.date_naive());
        db::progress::save_progress(&tx, &progress)?;

        let updated = db::mcq::get_review_by_id(&tx, review_id)?
            .ok_or_else(|| Error::Integrity(format!("mcq review {} vanished mid-apply", review_id)))?;

        tx.commit()?;
        tracing::debug!(
            review_id,
            is_correct,
            selected_option,
            due = %updated.due_date,
            "applied MCQ review"
        );
        Ok(updated)
    }

    pub fn count(
        &self,
        jlpt_level: Option<JlptLevel>,
        item_kind: Option<ItemKind>,
    ) -> Result<i64> {
        let conn = db::try_lock(&self.pool)?;
        db::mcq::count_reviews(&conn, jlpt_level, item_kind)
    }
}

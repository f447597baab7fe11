//! User progress: levels, milestones, and the daily study streak.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::item::JlptLevel;

/// Snapshot statistics stored as a JSON blob on the progress row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total_vocab: i64,
    pub total_kanji: i64,
    pub mastered_vocab: i64,
    pub mastered_kanji: i64,
    pub total_reviews: i64,
    /// Retention rate in [0, 1].
    pub average_retention: f64,
}

/// Singleton per-user progress record.
#[derive(Debug, Clone)]
pub struct Progress {
    pub id: i64,
    pub user_id: String,
    pub current_level: JlptLevel,
    pub target_level: JlptLevel,
    pub stats: ProgressStats,
    pub milestones: Vec<String>,
    pub streak_days: i64,
    pub last_review_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    /// Fold a successful review on `review_date` into the streak.
    ///
    /// Same day: unchanged. Consecutive day: increment. First review ever
    /// or a gap of more than one day: reset to 1.
    pub fn record_review_day(&mut self, review_date: NaiveDate) {
        match self.last_review_date {
            None => self.streak_days = 1,
            Some(last) if review_date == last => {}
            Some(last) if (review_date - last).num_days() == 1 => self.streak_days += 1,
            Some(_) => self.streak_days = 1,
        }
        self.last_review_date = Some(review_date);
    }

    pub fn add_milestone(&mut self, milestone: &str) {
        if !self.milestones.iter().any(|m| m == milestone) {
            self.milestones.push(milestone.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress() -> Progress {
        Progress {
            id: 1,
            user_id: "default".to_string(),
            current_level: JlptLevel::N5,
            target_level: JlptLevel::N4,
            stats: ProgressStats::default(),
            milestones: vec![],
            streak_days: 0,
            last_review_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn consecutive_days_increment_streak() {
        let mut p = progress();
        p.record_review_day(day("2025-03-01"));
        assert_eq!(p.streak_days, 1);
        p.record_review_day(day("2025-03-02"));
        assert_eq!(p.streak_days, 2);
        p.record_review_day(day("2025-03-03"));
        assert_eq!(p.streak_days, 3);
    }

    #[test]
    fn same_day_reviews_do_not_double_count() {
        let mut p = progress();
        p.record_review_day(day("2025-03-01"));
        p.record_review_day(day("2025-03-01"));
        assert_eq!(p.streak_days, 1);
    }

    #[test]
    fn gap_resets_streak_to_one() {
        let mut p = progress();
        p.record_review_day(day("2025-03-01"));
        p.record_review_day(day("2025-03-02"));
        p.record_review_day(day("2025-03-05"));
        assert_eq!(p.streak_days, 1);
        assert_eq!(p.last_review_date, Some(day("2025-03-05")));
    }

    #[test]
    fn milestones_are_deduplicated() {
        let mut p = progress();
        p.add_milestone("100 reviews");
        p.add_milestone("100 reviews");
        assert_eq!(p.milestones.len(), 1);
    }
}

//! FSRS scheduling engine.
//!
//! Memory math (stability, difficulty, review-phase intervals) is delegated
//! to the `fsrs` crate; this module owns the learning-step state machine,
//! interval fuzzing, and the card transition rules. No other component
//! inspects or mutates card fields.

use chrono::{DateTime, Duration, Utc};
use fsrs::{MemoryState, DEFAULT_PARAMETERS, FSRS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Card, CardState, Rating, SrsReviewLog};
use crate::error::{Error, Result};

/// Fuzz ranges from the FSRS reference: (lower bound in days, upper bound,
/// jitter factor). Intervals under 2.5 days are never fuzzed.
const FUZZ_RANGES: [(f64, f64, f64); 3] = [
    (2.5, 7.0, 0.15),
    (7.0, 20.0, 0.10),
    (20.0, f64::INFINITY, 0.05),
];

/// Scheduling configuration. Defaults mirror the FSRS reference scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Target probability of recall at the next review, in (0, 1].
    pub desired_retention: f64,
    /// Relative intervals during the initial Learning phase.
    pub learning_steps: Vec<Duration>,
    /// Intervals after a lapse, before graduating back to Review.
    pub relearning_steps: Vec<Duration>,
    /// Hard cap on scheduled intervals, in days.
    pub maximum_interval_days: i64,
    /// Bounded random jitter on review intervals, to spread clusters.
    pub enable_fuzzing: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            desired_retention: 0.9,
            learning_steps: vec![Duration::minutes(1), Duration::minutes(10)],
            relearning_steps: vec![Duration::minutes(10)],
            maximum_interval_days: 36_500,
            enable_fuzzing: true,
        }
    }
}

/// The FSRS engine: a pure transition function over (card, rating, now),
/// deterministic when fuzzing is disabled.
pub struct FsrsEngine {
    config: SchedulerConfig,
    fsrs: FSRS,
    rng: StdRng,
}

impl FsrsEngine {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            fsrs: FSRS::new(Some(&DEFAULT_PARAMETERS)).expect("default FSRS parameters are valid"),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Engine with a fixed RNG seed, for deterministic fuzzing in tests.
    pub fn seeded(config: SchedulerConfig, seed: u64) -> Self {
        Self {
            config,
            fsrs: FSRS::new(Some(&DEFAULT_PARAMETERS)).expect("default FSRS parameters are valid"),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Fresh card in Learning state, due immediately.
    pub fn create_card(&self, now: DateTime<Utc>) -> Card {
        Card::new(now)
    }

    /// Apply one review: returns the successor card and a log entry.
    /// The input card is untouched.
    pub fn review_card(
        &mut self,
        card: &Card,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<(Card, SrsReviewLog)> {
        let mut next = card.clone();

        let (stability, difficulty, review_interval_days) =
            self.next_memory_state(card, rating, now)?;
        next.stability = Some(stability);
        next.difficulty = Some(difficulty);

        let interval = match card.state {
            CardState::Learning => {
                self.step_interval(&mut next, rating, true, review_interval_days)
            }
            CardState::Relearning => {
                self.step_interval(&mut next, rating, false, review_interval_days)
            }
            CardState::Review => match rating {
                Rating::Again if !self.config.relearning_steps.is_empty() => {
                    next.state = CardState::Relearning;
                    next.step = 0;
                    self.config.relearning_steps[0]
                }
                _ => {
                    next.step = 0;
                    Duration::days(review_interval_days)
                }
            },
        };

        let interval = if self.config.enable_fuzzing && next.state == CardState::Review {
            Duration::days(self.fuzzed_days(interval.num_days()))
        } else {
            interval
        };

        next.due = now + interval;
        next.last_review = Some(now);

        let log = SrsReviewLog {
            card_id: card.card_id,
            rating,
            reviewed_at: now,
        };
        Ok((next, log))
    }

    /// Delegate the DSR update to the reference implementation and pull out
    /// the scheduled state for this rating.
    fn next_memory_state(
        &self,
        card: &Card,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<(f64, f64, i64)> {
        let current_memory = match (card.stability, card.difficulty) {
            (Some(stability), Some(difficulty)) => Some(MemoryState {
                stability: stability as f32,
                difficulty: difficulty as f32,
            }),
            _ => None,
        };

        let elapsed_days = card
            .last_review
            .map(|last| (now - last).num_days().max(0) as u32)
            .unwrap_or(0);

        let next_states = self
            .fsrs
            .next_states(
                current_memory,
                self.config.desired_retention as f32,
                elapsed_days,
            )
            .map_err(|e| Error::Invalid(format!("FSRS scheduling failed: {}", e)))?;

        let scheduled = match rating {
            Rating::Again => &next_states.again,
            Rating::Hard => &next_states.hard,
            Rating::Good => &next_states.good,
            Rating::Easy => &next_states.easy,
        };

        let interval_days = (scheduled.interval.round() as i64)
            .clamp(1, self.config.maximum_interval_days);

        Ok((
            scheduled.memory.stability as f64,
            scheduled.memory.difficulty as f64,
            interval_days,
        ))
    }

    /// Learning/relearning step machine from the reference scheduler.
    /// Mutates the successor card's state and step, returns the interval.
    fn step_interval(
        &self,
        next: &mut Card,
        rating: Rating,
        learning: bool,
        review_interval_days: i64,
    ) -> Duration {
        let steps = if learning {
            &self.config.learning_steps
        } else {
            &self.config.relearning_steps
        };

        let graduate = |next: &mut Card| {
            next.state = CardState::Review;
            next.step = 0;
            Duration::days(review_interval_days)
        };

        if steps.is_empty() || (next.step >= steps.len() && rating != Rating::Again) {
            return graduate(next);
        }

        match rating {
            Rating::Again => {
                next.step = 0;
                steps[0]
            }
            Rating::Hard => {
                // Hold the step; the first step gets a slightly longer
                // interval so Hard still differs from Again.
                if next.step == 0 && steps.len() == 1 {
                    steps[0] * 3 / 2
                } else if next.step == 0 {
                    (steps[0] + steps[1]) / 2
                } else {
                    steps[next.step.min(steps.len() - 1)]
                }
            }
            Rating::Good => {
                if next.step + 1 >= steps.len() {
                    graduate(next)
                } else {
                    next.step += 1;
                    steps[next.step]
                }
            }
            Rating::Easy => graduate(next),
        }
    }

    /// Bounded jitter on a day-scale interval, per the reference ranges.
    fn fuzzed_days(&mut self, days: i64) -> i64 {
        if (days as f64) < 2.5 {
            return days;
        }

        let mut delta = 1.0;
        for (start, end, factor) in FUZZ_RANGES {
            delta += factor * ((days as f64).min(end) - start).max(0.0);
        }

        let min_ivl = ((days as f64 - delta).round() as i64).max(2);
        let max_ivl = ((days as f64 + delta).round() as i64).min(self.config.maximum_interval_days);
        let min_ivl = min_ivl.min(max_ivl);

        self.rng.random_range(min_ivl..=max_ivl)
    }
}

impl Default for FsrsEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn engine() -> FsrsEngine {
        FsrsEngine::with_config(SchedulerConfig {
            enable_fuzzing: false,
            ..SchedulerConfig::default()
        })
    }

    fn review_card_with(stability: f64, now: DateTime<Utc>) -> Card {
        Card {
            card_id: 1,
            state: CardState::Review,
            step: 0,
            stability: Some(stability),
            difficulty: Some(5.0),
            due: now,
            last_review: Some(now - Duration::days(stability.round() as i64)),
        }
    }

    #[test]
    fn first_good_advances_to_second_learning_step() {
        let mut engine = engine();
        let now = at("2025-01-01T00:00:00Z");
        let card = engine.create_card(now);

        let (next, log) = engine.review_card(&card, Rating::Good, now).unwrap();

        assert_eq!(next.state, CardState::Learning);
        assert_eq!(next.step, 1);
        assert_eq!(next.due, now + Duration::minutes(10));
        assert!(next.due > now);
        assert!(next.stability.unwrap() > 0.0);
        assert!(next.difficulty.unwrap() >= 1.0 && next.difficulty.unwrap() <= 10.0);
        assert_eq!(next.last_review, Some(now));
        assert_eq!(log.rating, Rating::Good);
        assert_eq!(log.reviewed_at, now);
    }

    #[test]
    fn good_on_last_step_graduates_to_review() {
        let mut engine = engine();
        let now = at("2025-01-01T00:00:00Z");
        let card = engine.create_card(now);

        let (step2, _) = engine.review_card(&card, Rating::Good, now).unwrap();
        let later = now + Duration::minutes(10);
        let (graduated, _) = engine.review_card(&step2, Rating::Good, later).unwrap();

        assert_eq!(graduated.state, CardState::Review);
        assert!(graduated.due >= later + Duration::days(1));
    }

    #[test]
    fn easy_graduates_immediately() {
        let mut engine = engine();
        let now = at("2025-01-01T00:00:00Z");
        let card = engine.create_card(now);

        let (next, _) = engine.review_card(&card, Rating::Easy, now).unwrap();
        assert_eq!(next.state, CardState::Review);
        assert!(next.due >= now + Duration::days(1));
    }

    #[test]
    fn again_resets_to_first_learning_step() {
        let mut engine = engine();
        let now = at("2025-01-01T00:00:00Z");
        let card = engine.create_card(now);

        let (step2, _) = engine.review_card(&card, Rating::Good, now).unwrap();
        let (reset, _) = engine.review_card(&step2, Rating::Again, now).unwrap();

        assert_eq!(reset.state, CardState::Learning);
        assert_eq!(reset.step, 0);
        assert_eq!(reset.due, now + Duration::minutes(1));
    }

    #[test]
    fn hard_on_first_step_averages_first_two_steps() {
        let mut engine = engine();
        let now = at("2025-01-01T00:00:00Z");
        let card = engine.create_card(now);

        let (next, _) = engine.review_card(&card, Rating::Hard, now).unwrap();
        assert_eq!(next.state, CardState::Learning);
        assert_eq!(next.step, 0);
        // (1 min + 10 min) / 2
        assert_eq!(next.due, now + Duration::seconds(330));
    }

    #[test]
    fn lapse_moves_review_card_into_relearning() {
        let mut engine = engine();
        let now = at("2025-06-01T00:00:00Z");
        let card = review_card_with(30.0, now);

        let (next, _) = engine.review_card(&card, Rating::Again, now).unwrap();

        assert_eq!(next.state, CardState::Relearning);
        assert_eq!(next.step, 0);
        assert!(next.stability.unwrap() < 30.0);
        assert_eq!(next.due, now + Duration::minutes(10));
    }

    #[test]
    fn relearning_good_graduates_back_to_review() {
        let mut engine = engine();
        let now = at("2025-06-01T00:00:00Z");
        let card = review_card_with(30.0, now);

        let (lapsed, _) = engine.review_card(&card, Rating::Again, now).unwrap();
        let later = now + Duration::minutes(10);
        let (recovered, _) = engine.review_card(&lapsed, Rating::Good, later).unwrap();

        assert_eq!(recovered.state, CardState::Review);
        assert!(recovered.due >= later + Duration::days(1));
    }

    #[test]
    fn successful_review_grows_stability() {
        let mut engine = engine();
        let now = at("2025-06-01T00:00:00Z");
        let card = review_card_with(10.0, now);

        let (next, _) = engine.review_card(&card, Rating::Good, now).unwrap();
        assert_eq!(next.state, CardState::Review);
        assert!(next.stability.unwrap() > 10.0);
    }

    #[test]
    fn easy_schedules_further_than_hard() {
        let mut engine = engine();
        let now = at("2025-06-01T00:00:00Z");
        let card = review_card_with(10.0, now);

        let (hard, _) = engine.review_card(&card, Rating::Hard, now).unwrap();
        let (easy, _) = engine.review_card(&card, Rating::Easy, now).unwrap();
        assert!(easy.due > hard.due);
    }

    #[test]
    fn interval_respects_maximum() {
        let mut engine = FsrsEngine::with_config(SchedulerConfig {
            enable_fuzzing: false,
            maximum_interval_days: 30,
            ..SchedulerConfig::default()
        });
        let now = at("2025-06-01T00:00:00Z");
        let card = review_card_with(5000.0, now);

        let (next, _) = engine.review_card(&card, Rating::Easy, now).unwrap();
        assert!(next.due <= now + Duration::days(30));
    }

    #[test]
    fn deterministic_without_fuzzing() {
        let now = at("2025-06-01T00:00:00Z");
        let card = review_card_with(12.0, now);

        let (a, _) = engine().review_card(&card, Rating::Good, now).unwrap();
        let (b, _) = engine().review_card(&card, Rating::Good, now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fuzzing_stays_within_reference_bounds() {
        let mut engine = FsrsEngine::seeded(SchedulerConfig::default(), 7);
        // 10-day interval falls in the ±10% band (delta = 1.975 days).
        for _ in 0..100 {
            let fuzzed = engine.fuzzed_days(10);
            assert!((8..=12).contains(&fuzzed), "fuzzed to {}", fuzzed);
        }
        // Short intervals are left alone.
        assert_eq!(engine.fuzzed_days(1), 1);
        assert_eq!(engine.fuzzed_days(2), 2);
    }

    #[test]
    fn rating_sequence_round_trips_through_blob() {
        let mut engine = engine();
        let mut now = at("2025-01-01T00:00:00Z");
        let mut card = engine.create_card(now);

        for rating in [Rating::Good, Rating::Good, Rating::Hard, Rating::Again, Rating::Good] {
            let (next, _) = engine.review_card(&card, rating, now).unwrap();
            card = next;
            now += Duration::days(1);
        }

        let blob = card.to_json().unwrap();
        assert_eq!(Card::from_json(&blob).unwrap(), card);
    }
}

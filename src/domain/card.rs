//! FSRS memory unit owned by a review record.
//!
//! The card blob layout is the FSRS reference serialization
//! (`{card_id, state, step, stability, difficulty, due, last_review}` with
//! integer states and RFC3339 instants), so state written here stays
//! readable by any other FSRS port.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Memory phase of a card. A fresh card starts in Learning; a lapse from
/// Review passes through Relearning before graduating back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Learning,
    Review,
    Relearning,
}

impl CardState {
    pub fn as_int(&self) -> u8 {
        match self {
            Self::Learning => 1,
            Self::Review => 2,
            Self::Relearning => 3,
        }
    }

    pub fn from_int(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Learning),
            2 => Some(Self::Review),
            3 => Some(Self::Relearning),
            _ => None,
        }
    }
}

impl Serialize for CardState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_int())
    }
}

impl<'de> Deserialize<'de> for CardState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        CardState::from_int(value)
            .ok_or_else(|| D::Error::custom(format!("invalid card state {}", value)))
    }
}

/// Recall quality supplied by the user (or inferred from MCQ correctness).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub fn as_int(&self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Convert a 1-4 integer rating, rejecting anything else before it can
    /// reach the database.
    pub fn from_int(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            other => Err(Error::Invalid(format!(
                "rating must be 1-4 (1=Again, 2=Hard, 3=Good, 4=Easy), got {}",
                other
            ))),
        }
    }

    pub fn is_recall(&self) -> bool {
        matches!(self, Self::Good | Self::Easy)
    }
}

/// The FSRS memory state for one item in one review mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub card_id: i64,
    pub state: CardState,
    /// Position within the learning/relearning step table; 0 once the card
    /// has graduated to Review.
    pub step: usize,
    /// Days-equivalent memory stability; None before the first review.
    pub stability: Option<f64>,
    /// Difficulty in [1, 10]; None before the first review.
    pub difficulty: Option<f64>,
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
}

impl Card {
    /// Fresh card, due immediately, ready for its first review.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            card_id: now.timestamp_millis(),
            state: CardState::Learning,
            step: 0,
            stability: None,
            difficulty: None,
            due: now,
            last_review: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }

    /// Serialize to the storage blob.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Invalid(format!("card serialization failed: {}", e)))
    }

    /// Deserialize from a storage blob written by `to_json`.
    pub fn from_json(blob: &str) -> Result<Self> {
        serde_json::from_str(blob)
            .map_err(|e| Error::Integrity(format!("corrupt card blob: {}", e)))
    }
}

/// What the engine reports about a single applied review.
#[derive(Debug, Clone, PartialEq)]
pub struct SrsReviewLog {
    pub card_id: i64,
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
}

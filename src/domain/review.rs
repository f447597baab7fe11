//! Review records and their append-only history rows.
//!
//! A review links one catalog item to one FSRS card in one study mode.
//! Flashcard and MCQ reviews live in separate tables with independent
//! cards; the same item can be due in one mode and not the other.

use chrono::{DateTime, Utc};

use super::card::Card;
use super::item::ItemKind;

/// One item's scheduling state in one mode.
///
/// `due_date` is denormalized from `card.due` so the due queue can be
/// answered from an indexed column; `apply` keeps the two in sync.
#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub id: i64,
    pub item_id: i64,
    pub item_kind: ItemKind,
    pub card: Card,
    pub due_date: DateTime<Utc>,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only log row for a flashcard review.
#[derive(Debug, Clone)]
pub struct FlashHistoryEntry {
    pub id: i64,
    pub review_id: i64,
    /// 1=Again, 2=Hard, 3=Good, 4=Easy.
    pub rating: u8,
    pub duration_ms: Option<i64>,
    pub reviewed_at: DateTime<Utc>,
}

/// Append-only log row for an MCQ review.
#[derive(Debug, Clone)]
pub struct McqHistoryEntry {
    pub id: i64,
    pub review_id: i64,
    /// 0=A, 1=B, 2=C, 3=D.
    pub selected_option: u8,
    pub is_correct: bool,
    pub duration_ms: Option<i64>,
    pub reviewed_at: DateTime<Utc>,
}

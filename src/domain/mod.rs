pub mod card;
pub mod item;
pub mod progress;
pub mod review;

pub use card::{Card, CardState, Rating, SrsReviewLog};
pub use item::{Item, ItemKind, JlptLevel, KanjiItem, Language, Meanings, VocabItem};
pub use progress::{Progress, ProgressStats};
pub use review::{FlashHistoryEntry, McqHistoryEntry, ReviewRecord};

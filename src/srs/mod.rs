pub mod engine;
pub mod mcq_generator;
pub mod mcq_scheduler;
pub mod scheduler;
pub mod statistics;

pub use engine::{FsrsEngine, SchedulerConfig};
pub use mcq_generator::{McqGenerator, Question, QuestionType};
pub use mcq_scheduler::McqScheduler;
pub use scheduler::FlashcardScheduler;

//! Command-line surface: thin wiring from clap commands to the core
//! operations. Rendering is plain line-oriented text; the interesting
//! behavior all lives in `srs` and `db`.

mod mcq;
mod progress;
mod review;

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::{ItemKind, JlptLevel, Language};
use crate::error::{Error, Result};
use crate::srs::QuestionType;

#[derive(Parser)]
#[command(
    name = "nihongo-cli",
    version,
    about = "Spaced-repetition Japanese study from the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Review due flashcards
    Review {
        /// Maximum cards this session
        #[arg(long)]
        limit: Option<usize>,
        /// Only cards at this JLPT level (n5..n1)
        #[arg(long, value_parser = parse_level)]
        level: Option<JlptLevel>,
        /// Only vocabulary or only kanji
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Answer due multiple-choice questions
    Mcq {
        #[arg(long, value_enum, default_value = "both")]
        kind: McqKindArg,
        #[arg(long, value_parser = parse_level)]
        level: Option<JlptLevel>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long = "question-type", value_enum, default_value = "mixed")]
        question_type: QuestionTypeArg,
        #[arg(long, value_enum, default_value = "vi")]
        language: LanguageArg,
    },
    /// Show progress, set levels, or display statistics
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },
}

#[derive(Subcommand)]
pub enum ProgressCommand {
    /// Show levels, streak, and catalog counts
    Show,
    /// Update the target (or current) JLPT level
    SetLevel {
        #[arg(value_parser = parse_level)]
        level: JlptLevel,
        /// Set the current level instead of the target level
        #[arg(long)]
        current: bool,
    },
    /// Detailed statistics over a date range
    Stats {
        /// 7d, 30d, or all
        #[arg(long, default_value = "all")]
        range: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Vocab,
    Kanji,
}

impl From<KindArg> for ItemKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Vocab => ItemKind::Vocab,
            KindArg::Kanji => ItemKind::Kanji,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum McqKindArg {
    Vocab,
    Kanji,
    Both,
}

impl McqKindArg {
    fn item_kind(self) -> Option<ItemKind> {
        match self {
            Self::Vocab => Some(ItemKind::Vocab),
            Self::Kanji => Some(ItemKind::Kanji),
            Self::Both => None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum QuestionTypeArg {
    W2m,
    M2w,
    Mixed,
}

impl From<QuestionTypeArg> for QuestionType {
    fn from(value: QuestionTypeArg) -> Self {
        match value {
            QuestionTypeArg::W2m => QuestionType::WordToMeaning,
            QuestionTypeArg::M2w => QuestionType::MeaningToWord,
            QuestionTypeArg::Mixed => QuestionType::Mixed,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LanguageArg {
    Vi,
    En,
}

impl From<LanguageArg> for Language {
    fn from(value: LanguageArg) -> Self {
        match value {
            LanguageArg::Vi => Language::Vi,
            LanguageArg::En => Language::En,
        }
    }
}

fn parse_level(value: &str) -> std::result::Result<JlptLevel, String> {
    JlptLevel::from_str(&value.to_lowercase())
        .ok_or_else(|| format!("'{}' is not a JLPT level (expected n5..n1)", value))
}

/// Dispatch a parsed command against the database.
pub fn run(cli: Cli) -> Result<()> {
    let db_path = crate::config::load_database_path();
    let pool = crate::db::init_db(&db_path)?;

    match cli.command {
        Command::Review { limit, level, kind } => {
            review::run_session(pool, limit, level, kind.map(Into::into))
        }
        Command::Mcq {
            kind,
            level,
            limit,
            question_type,
            language,
        } => mcq::run_session(
            pool,
            limit,
            level,
            kind.item_kind(),
            question_type.into(),
            language.into(),
        ),
        Command::Progress { command } => match command {
            ProgressCommand::Show => progress::show(pool),
            ProgressCommand::SetLevel { level, current } => {
                progress::set_level(pool, level, current)
            }
            ProgressCommand::Stats { range } => progress::stats(pool, &range),
        },
    }
}

/// Prompt and read one trimmed line. None means EOF: the session should
/// wind down cleanly.
pub(crate) fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout()
        .flush()
        .map_err(|e| Error::Invalid(format!("stdout unavailable: {}", e)))?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| Error::Invalid(format!("stdin unavailable: {}", e)))?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

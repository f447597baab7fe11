//! Multiple-choice question generation.
//!
//! Distractors come from the union of four strategies: same JLPT level,
//! shared meaning keywords, similar readings, and (for kanji) visual
//! similarity via radical or stroke count. Diversity beats precision here:
//! a varied pool produces more instructive wrong answers than any single
//! ranking would. When the pool runs shallow the generator falls back to
//! random same-kind items, and gives up with `Unavailable` only when the
//! whole catalog cannot supply four unique display strings.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;

use crate::db::{self, catalog::ItemFilter, DbPool};
use crate::domain::{Item, ItemKind, JlptLevel, Language};
use crate::error::{Error, Result};

/// Question direction. `Mixed` resolves to one of the other two with a
/// fair coin flip per generated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    WordToMeaning,
    MeaningToWord,
    Mixed,
}

/// A ready-to-ask question: four options, exactly one correct.
#[derive(Debug, Clone)]
pub struct Question {
    pub item_id: i64,
    pub item_kind: ItemKind,
    /// The direction actually used (never `Mixed`).
    pub question_type: QuestionType,
    pub prompt: String,
    pub options: [String; 4],
    pub correct_index: usize,
    pub jlpt_level: Option<JlptLevel>,
    pub explanation: String,
}

impl Question {
    pub fn is_correct(&self, selected_index: usize) -> bool {
        selected_index == self.correct_index
    }

    pub fn correct_answer(&self) -> &str {
        &self.options[self.correct_index]
    }
}

/// What a distractor should display: another item's meaning, or another
/// item's Japanese surface.
#[derive(Clone, Copy, PartialEq, Eq)]
enum DistractorText {
    Meaning,
    Surface,
}

pub struct McqGenerator {
    pool: DbPool,
    rng: StdRng,
}

impl McqGenerator {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Generator with a fixed RNG seed, for deterministic tests.
    pub fn seeded(pool: DbPool, seed: u64) -> Self {
        Self {
            pool,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build a question for an item. `NotFound` when the item does not
    /// exist, `Unavailable` when the catalog cannot fill four unique
    /// options.
    pub fn generate(
        &mut self,
        item_id: i64,
        item_kind: ItemKind,
        question_type: QuestionType,
        language: Language,
    ) -> Result<Question> {
        // Hold the lock through the whole build so the candidate queries
        // see one consistent snapshot.
        let pool = self.pool.clone();
        let conn = db::try_lock(&pool)?;

        let item = db::catalog::get_item(&conn, item_id, item_kind)?.ok_or_else(|| {
            Error::NotFound(format!("{} item {}", item_kind.as_str(), item_id))
        })?;
        let language = item.effective_language(language);

        let resolved = match question_type {
            QuestionType::Mixed => {
                if self.rng.random_bool(0.5) {
                    QuestionType::WordToMeaning
                } else {
                    QuestionType::MeaningToWord
                }
            }
            other => other,
        };

        match resolved {
            QuestionType::WordToMeaning => self.word_to_meaning(&conn, &item, language),
            QuestionType::MeaningToWord => self.meaning_to_word(&conn, &item, language),
            QuestionType::Mixed => unreachable!("Mixed resolved above"),
        }
    }

    fn word_to_meaning(
        &mut self,
        conn: &Connection,
        item: &Item,
        language: Language,
    ) -> Result<Question> {
        let prompt = match item {
            Item::Vocab(v) => format!("What is the meaning of '{}' ({})?", v.word, v.reading),
            Item::Kanji(k) => format!("What is the meaning of the kanji '{}'?", k.character),
        };
        let correct = item.primary_meaning(language).ok_or_else(|| {
            Error::Unavailable(format!(
                "{} item {} has no meanings",
                item.kind().as_str(),
                item.id()
            ))
        })?;
        let correct = correct.to_string();

        let distractors = self.select_distractors(
            conn,
            item,
            DistractorText::Meaning,
            language,
            &correct,
        )?;
        let explanation = format!("'{}' means '{}'", item.surface_display(), correct);
        self.assemble(item, QuestionType::WordToMeaning, prompt, correct, distractors, explanation)
    }

    fn meaning_to_word(
        &mut self,
        conn: &Connection,
        item: &Item,
        language: Language,
    ) -> Result<Question> {
        let meaning = item.primary_meaning(language).ok_or_else(|| {
            Error::Unavailable(format!(
                "{} item {} has no meanings",
                item.kind().as_str(),
                item.id()
            ))
        })?;
        let prompt = format!("Which word means '{}'?", meaning);
        let correct = item.surface_display();

        let explanation = format!("'{}' is '{}'", meaning, correct);
        let distractors = self.select_distractors(
            conn,
            item,
            DistractorText::Surface,
            language,
            &correct,
        )?;
        self.assemble(item, QuestionType::MeaningToWord, prompt, correct, distractors, explanation)
    }

    /// Union of the four strategies, deduplicated, shuffled, topped up from
    /// random catalog items when shallow. Returns exactly three distractors
    /// distinct from each other and from `correct`.
    fn select_distractors(
        &mut self,
        conn: &Connection,
        item: &Item,
        text: DistractorText,
        language: Language,
        correct: &str,
    ) -> Result<Vec<String>> {
        let mut pool = Vec::new();

        pool.extend(same_level_candidates(conn, item)?);

        let semantic_applies = text == DistractorText::Meaning
            || (text == DistractorText::Surface && item.kind() == ItemKind::Vocab);
        if semantic_applies {
            pool.extend(similar_meaning_candidates(conn, item, language)?);
        }

        let phonetic_applies = item.kind() == ItemKind::Vocab
            || (item.kind() == ItemKind::Kanji && text == DistractorText::Surface);
        if phonetic_applies {
            pool.extend(similar_reading_candidates(conn, item)?);
        }

        if item.kind() == ItemKind::Kanji {
            pool.extend(visually_similar_candidates(conn, item)?);
        }

        let mut displays = Vec::new();
        let mut seen = std::collections::HashSet::new();
        seen.insert(correct.to_string());
        for candidate in &pool {
            let Some(display) = display_text(candidate, text, language) else {
                continue;
            };
            if seen.insert(display.clone()) {
                displays.push(display);
            }
        }

        displays.shuffle(&mut self.rng);
        displays.truncate(3);

        if displays.len() < 3 {
            self.top_up_from_catalog(conn, item, text, language, &mut displays, &mut seen)?;
        }
        if displays.len() < 3 {
            return Err(Error::Unavailable(format!(
                "only {} unique distractors available for {} item {}",
                displays.len(),
                item.kind().as_str(),
                item.id()
            )));
        }
        Ok(displays)
    }

    /// Shallow-pool fallback: random same-kind items until the option set
    /// is full or the catalog is exhausted.
    fn top_up_from_catalog(
        &mut self,
        conn: &Connection,
        item: &Item,
        text: DistractorText,
        language: Language,
        displays: &mut Vec<String>,
        seen: &mut std::collections::HashSet<String>,
    ) -> Result<()> {
        let filter = ItemFilter {
            exclude_ids: vec![item.id()],
            random_order: true,
            ..ItemFilter::default()
        };
        for candidate in db::catalog::list_items(conn, item.kind(), &filter)? {
            if displays.len() >= 3 {
                break;
            }
            let Some(display) = display_text(&candidate, text, language) else {
                continue;
            };
            if seen.insert(display.clone()) {
                displays.push(display);
            }
        }
        Ok(())
    }

    /// Uniform random permutation of {correct, d1, d2, d3}, tracking where
    /// the correct option lands.
    fn assemble(
        &mut self,
        item: &Item,
        question_type: QuestionType,
        prompt: String,
        correct: String,
        distractors: Vec<String>,
        explanation: String,
    ) -> Result<Question> {
        let mut tagged: Vec<(bool, String)> = Vec::with_capacity(4);
        tagged.push((true, correct));
        tagged.extend(distractors.into_iter().map(|d| (false, d)));
        tagged.shuffle(&mut self.rng);

        let correct_index = tagged
            .iter()
            .position(|(is_correct, _)| *is_correct)
            .ok_or_else(|| Error::Integrity("correct option lost during shuffle".to_string()))?;
        let options: Vec<String> = tagged.into_iter().map(|(_, text)| text).collect();
        let options: [String; 4] = options
            .try_into()
            .map_err(|_| Error::Integrity("question did not end up with four options".to_string()))?;

        Ok(Question {
            item_id: item.id(),
            item_kind: item.kind(),
            question_type,
            prompt,
            options,
            correct_index,
            jlpt_level: item.jlpt_level(),
            explanation,
        })
    }
}

/// Strategy 1: up to 10 random items of the same kind and JLPT level.
fn same_level_candidates(conn: &Connection, item: &Item) -> Result<Vec<Item>> {
    let Some(level) = item.jlpt_level() else {
        return Ok(Vec::new());
    };
    let filter = ItemFilter {
        jlpt_level: Some(level),
        exclude_ids: vec![item.id()],
        limit: Some(10),
        random_order: true,
        ..ItemFilter::default()
    };
    db::catalog::list_items(conn, item.kind(), &filter)
}

/// Strategy 2: items whose meanings share the subject's leading keywords.
/// Takes the first two whitespace tokens of each meaning in the requested
/// language and substring-matches them against other items' meaning blobs.
fn similar_meaning_candidates(
    conn: &Connection,
    item: &Item,
    language: Language,
) -> Result<Vec<Item>> {
    let Some(meanings) = item.meanings().get(&language) else {
        return Ok(Vec::new());
    };

    let mut keywords = Vec::new();
    for meaning in meanings {
        for token in meaning.to_lowercase().split_whitespace().take(2) {
            let token = token.to_string();
            if !keywords.contains(&token) {
                keywords.push(token);
            }
        }
    }

    let mut candidates = Vec::new();
    for keyword in keywords {
        if candidates.len() >= 10 {
            break;
        }
        let filter = ItemFilter {
            meaning_substring: Some(keyword),
            exclude_ids: vec![item.id()],
            limit: Some(5),
            random_order: true,
            ..ItemFilter::default()
        };
        candidates.extend(db::catalog::list_items(conn, item.kind(), &filter)?);
    }
    candidates.truncate(10);
    Ok(candidates)
}

/// Strategy 3: phonetic neighbours. Vocabulary shares the first two reading
/// characters; kanji share an on-reading.
fn similar_reading_candidates(conn: &Connection, item: &Item) -> Result<Vec<Item>> {
    match item {
        Item::Vocab(v) => {
            let prefix: String = v.reading.chars().take(2).collect();
            if prefix.is_empty() {
                return Ok(Vec::new());
            }
            let filter = ItemFilter {
                reading_prefix: Some(prefix),
                exclude_ids: vec![item.id()],
                limit: Some(5),
                random_order: true,
                ..ItemFilter::default()
            };
            db::catalog::list_items(conn, ItemKind::Vocab, &filter)
        }
        Item::Kanji(k) => {
            let mut candidates = Vec::new();
            for reading in &k.on_readings {
                if candidates.len() >= 5 {
                    break;
                }
                let filter = ItemFilter {
                    reading_prefix: Some(reading.clone()),
                    exclude_ids: vec![item.id()],
                    limit: Some(5),
                    random_order: true,
                    ..ItemFilter::default()
                };
                candidates.extend(db::catalog::list_items(conn, ItemKind::Kanji, &filter)?);
            }
            candidates.truncate(5);
            Ok(candidates)
        }
    }
}

/// Strategy 4 (kanji only): same radical, or stroke count within ±2.
fn visually_similar_candidates(conn: &Connection, item: &Item) -> Result<Vec<Item>> {
    let Item::Kanji(k) = item else {
        return Ok(Vec::new());
    };
    let mut candidates = Vec::new();

    if let Some(radical) = &k.radical {
        let filter = ItemFilter {
            radical: Some(radical.clone()),
            exclude_ids: vec![item.id()],
            limit: Some(3),
            random_order: true,
            ..ItemFilter::default()
        };
        candidates.extend(db::catalog::list_items(conn, ItemKind::Kanji, &filter)?);
    }
    if let Some(strokes) = k.stroke_count {
        let filter = ItemFilter {
            stroke_count_range: Some((strokes.saturating_sub(2), strokes + 2)),
            exclude_ids: vec![item.id()],
            limit: Some(3),
            random_order: true,
            ..ItemFilter::default()
        };
        candidates.extend(db::catalog::list_items(conn, ItemKind::Kanji, &filter)?);
    }
    Ok(candidates)
}

/// The string a candidate would display as an option, or None when it has
/// nothing usable (e.g. no meanings in any language).
fn display_text(candidate: &Item, text: DistractorText, language: Language) -> Option<String> {
    match text {
        DistractorText::Meaning => candidate.primary_meaning(language).map(str::to_string),
        DistractorText::Surface => Some(candidate.surface_display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog::{insert_kanji, insert_vocab};
    use crate::testing::{kanji_fixture, vocab_fixture, TestDb};

    fn seed_catalog(db: &TestDb) -> i64 {
        let conn = db.conn();
        let subject = insert_vocab(
            &conn,
            &vocab_fixture("水", "みず", &["nước"], &["water"], Some(JlptLevel::N5)),
        )
        .unwrap();
        for (word, reading, vi, en) in [
            ("火", "ひ", "lửa", "fire"),
            ("木", "き", "cây", "tree"),
            ("金", "かね", "tiền", "money"),
            ("土", "つち", "đất", "earth"),
        ] {
            insert_vocab(
                &conn,
                &vocab_fixture(word, reading, &[vi], &[en], Some(JlptLevel::N5)),
            )
            .unwrap();
        }
        subject
    }

    #[test]
    fn word_to_meaning_has_four_unique_options_with_one_correct() {
        let db = TestDb::new();
        let subject = seed_catalog(&db);
        let mut generator = McqGenerator::seeded(db.pool(), 11);

        let question = generator
            .generate(subject, ItemKind::Vocab, QuestionType::WordToMeaning, Language::Vi)
            .unwrap();

        assert_eq!(question.prompt, "What is the meaning of '水' (みず)?");
        assert_eq!(question.options[question.correct_index], "nước");
        assert_eq!(question.question_type, QuestionType::WordToMeaning);

        let unique: std::collections::HashSet<&String> = question.options.iter().collect();
        assert_eq!(unique.len(), 4);
        assert_eq!(
            question.options.iter().filter(|o| *o == "nước").count(),
            1
        );
    }

    #[test]
    fn meaning_to_word_options_are_surfaces() {
        let db = TestDb::new();
        let subject = seed_catalog(&db);
        let mut generator = McqGenerator::seeded(db.pool(), 5);

        let question = generator
            .generate(subject, ItemKind::Vocab, QuestionType::MeaningToWord, Language::En)
            .unwrap();

        assert_eq!(question.prompt, "Which word means 'water'?");
        assert_eq!(question.correct_answer(), "水 (みず)");
        for option in &question.options {
            assert!(option.contains('('), "surface option missing reading: {}", option);
        }
    }

    #[test]
    fn falls_back_to_english_when_no_vietnamese_gloss_exists() {
        let db = TestDb::new();
        let subject = {
            let conn = db.conn();
            let id = insert_vocab(
                &conn,
                &vocab_fixture("犬", "いぬ", &[], &["dog"], Some(JlptLevel::N5)),
            )
            .unwrap();
            for (word, reading, en) in [("猫", "ねこ", "cat"), ("鳥", "とり", "bird"), ("馬", "うま", "horse")] {
                insert_vocab(&conn, &vocab_fixture(word, reading, &[], &[en], Some(JlptLevel::N5)))
                    .unwrap();
            }
            id
        };

        let mut generator = McqGenerator::seeded(db.pool(), 3);
        let question = generator
            .generate(subject, ItemKind::Vocab, QuestionType::WordToMeaning, Language::Vi)
            .unwrap();
        assert_eq!(question.correct_answer(), "dog");
    }

    #[test]
    fn minimal_catalog_of_four_items_still_generates() {
        let db = TestDb::new();
        let subject = {
            let conn = db.conn();
            // No shared level, keywords, or readings: every distractor must
            // come from the random fallback.
            let id = insert_vocab(&conn, &vocab_fixture("水", "みず", &["nước"], &[], None))
                .unwrap();
            insert_vocab(&conn, &vocab_fixture("火", "ひ", &["lửa"], &[], None)).unwrap();
            insert_vocab(&conn, &vocab_fixture("木", "き", &["cây"], &[], None)).unwrap();
            insert_vocab(&conn, &vocab_fixture("金", "かね", &["tiền"], &[], None)).unwrap();
            id
        };

        let mut generator = McqGenerator::seeded(db.pool(), 17);
        let question = generator
            .generate(subject, ItemKind::Vocab, QuestionType::WordToMeaning, Language::Vi)
            .unwrap();

        assert_eq!(question.correct_answer(), "nước");
        let unique: std::collections::HashSet<&String> = question.options.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn two_item_catalog_is_unavailable() {
        let db = TestDb::new();
        let subject = {
            let conn = db.conn();
            let id = insert_vocab(&conn, &vocab_fixture("水", "みず", &["nước"], &[], None))
                .unwrap();
            insert_vocab(&conn, &vocab_fixture("火", "ひ", &["lửa"], &[], None)).unwrap();
            id
        };

        let mut generator = McqGenerator::seeded(db.pool(), 1);
        let err = generator
            .generate(subject, ItemKind::Vocab, QuestionType::WordToMeaning, Language::Vi)
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[test]
    fn missing_subject_is_not_found() {
        let db = TestDb::new();
        let mut generator = McqGenerator::seeded(db.pool(), 1);
        let err = generator
            .generate(99, ItemKind::Vocab, QuestionType::WordToMeaning, Language::Vi)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn kanji_questions_use_visual_and_phonetic_neighbours() {
        let db = TestDb::new();
        let subject = {
            let conn = db.conn();
            let mut base = kanji_fixture("語", &["ゴ"], &["ngữ"], &["word"], Some(JlptLevel::N5));
            base.stroke_count = Some(14);
            base.radical = Some("言".to_string());
            let id = insert_kanji(&conn, &base).unwrap();

            let mut talk = kanji_fixture("話", &["ワ"], &["thoại"], &["talk"], Some(JlptLevel::N5));
            talk.stroke_count = Some(13);
            talk.radical = Some("言".to_string());
            insert_kanji(&conn, &talk).unwrap();

            let mut read = kanji_fixture("読", &["ドク"], &["độc"], &["read"], Some(JlptLevel::N5));
            read.stroke_count = Some(14);
            read.radical = Some("言".to_string());
            insert_kanji(&conn, &read).unwrap();

            let mut five = kanji_fixture("五", &["ゴ"], &["ngũ"], &["five"], Some(JlptLevel::N5));
            five.stroke_count = Some(4);
            insert_kanji(&conn, &five).unwrap();
            id
        };

        let mut generator = McqGenerator::seeded(db.pool(), 29);
        let question = generator
            .generate(subject, ItemKind::Kanji, QuestionType::MeaningToWord, Language::Vi)
            .unwrap();

        assert_eq!(question.prompt, "Which word means 'ngữ'?");
        assert_eq!(question.correct_answer(), "語");
        let unique: std::collections::HashSet<&String> = question.options.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn mixed_resolves_to_both_directions() {
        let db = TestDb::new();
        let subject = seed_catalog(&db);
        let mut generator = McqGenerator::seeded(db.pool(), 2);

        let mut seen_w2m = false;
        let mut seen_m2w = false;
        for _ in 0..50 {
            let question = generator
                .generate(subject, ItemKind::Vocab, QuestionType::Mixed, Language::Vi)
                .unwrap();
            match question.question_type {
                QuestionType::WordToMeaning => seen_w2m = true,
                QuestionType::MeaningToWord => seen_m2w = true,
                QuestionType::Mixed => panic!("question type was not resolved"),
            }
        }
        assert!(seen_w2m && seen_m2w);
    }

    #[test]
    fn correct_index_is_uniform_over_positions() {
        let db = TestDb::new();
        let subject = seed_catalog(&db);
        let mut generator = McqGenerator::seeded(db.pool(), 42);

        let mut counts = [0u32; 4];
        const N: u32 = 10_000;
        for _ in 0..N {
            let question = generator
                .generate(subject, ItemKind::Vocab, QuestionType::WordToMeaning, Language::Vi)
                .unwrap();
            counts[question.correct_index] += 1;
        }

        // Binomial(10000, 0.25): sigma ~= 43.3, so +-3 sigma ~= 130.
        let expected = (N / 4) as f64;
        let tolerance = 3.0 * (N as f64 * 0.25 * 0.75).sqrt();
        for (position, count) in counts.iter().enumerate() {
            let deviation = (*count as f64 - expected).abs();
            assert!(
                deviation <= tolerance,
                "position {} selected {} times (expected {} +- {})",
                position,
                count,
                expected,
                tolerance
            );
        }
    }
}

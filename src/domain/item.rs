//! Catalog item types: vocabulary words and kanji characters.
//!
//! Both variants share identity semantics (id, JLPT tag, meanings map,
//! notes, timestamps); the `Item` sum type carries whichever one a query
//! returned.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JLPT difficulty tag. N5 is the easiest level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JlptLevel {
    N5,
    N4,
    N3,
    N2,
    N1,
}

impl JlptLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "n5" => Some(Self::N5),
            "n4" => Some(Self::N4),
            "n3" => Some(Self::N3),
            "n2" => Some(Self::N2),
            "n1" => Some(Self::N1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::N5 => "n5",
            Self::N4 => "n4",
            Self::N3 => "n3",
            Self::N2 => "n2",
            Self::N1 => "n1",
        }
    }

    /// All levels, easiest first.
    pub fn all() -> [JlptLevel; 5] {
        [Self::N5, Self::N4, Self::N3, Self::N2, Self::N1]
    }
}

/// Which catalog table an item (or review) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Vocab,
    Kanji,
}

impl ItemKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "vocab" => Some(Self::Vocab),
            "kanji" => Some(Self::Kanji),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vocab => "vocab",
            Self::Kanji => "kanji",
        }
    }
}

/// Meaning language. Vietnamese is the primary study language; English is
/// the fallback when an item has no Vietnamese gloss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Vi,
    En,
}

impl Language {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "vi" => Some(Self::Vi),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vi => "vi",
            Self::En => "en",
        }
    }
}

/// Ordered meaning strings per language, stored as a JSON blob
/// (e.g. `{"vi": ["từ vựng"], "en": ["word", "vocabulary"]}`).
pub type Meanings = BTreeMap<Language, Vec<String>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabItem {
    pub id: i64,
    /// Kanji/kana surface form (e.g. "単語").
    pub word: String,
    /// Kana-only reading (e.g. "たんご").
    pub reading: String,
    pub meanings: Meanings,
    /// Sino-Vietnamese reading (e.g. "đơn ngữ").
    pub sino_vietnamese: Option<String>,
    pub jlpt_level: Option<JlptLevel>,
    pub part_of_speech: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KanjiItem {
    pub id: i64,
    /// Single character; unique across the catalog.
    pub character: String,
    pub on_readings: Vec<String>,
    pub kun_readings: Vec<String>,
    pub meanings: Meanings,
    /// Hán Việt reading (e.g. "ngữ").
    pub sino_vietnamese: Option<String>,
    pub jlpt_level: Option<JlptLevel>,
    pub stroke_count: Option<u32>,
    pub radical: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog item of either kind.
#[derive(Debug, Clone)]
pub enum Item {
    Vocab(VocabItem),
    Kanji(KanjiItem),
}

impl Item {
    pub fn id(&self) -> i64 {
        match self {
            Item::Vocab(v) => v.id,
            Item::Kanji(k) => k.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Vocab(_) => ItemKind::Vocab,
            Item::Kanji(_) => ItemKind::Kanji,
        }
    }

    pub fn jlpt_level(&self) -> Option<JlptLevel> {
        match self {
            Item::Vocab(v) => v.jlpt_level,
            Item::Kanji(k) => k.jlpt_level,
        }
    }

    pub fn meanings(&self) -> &Meanings {
        match self {
            Item::Vocab(v) => &v.meanings,
            Item::Kanji(k) => &k.meanings,
        }
    }

    /// Japanese display form: "単語 (たんご)" for vocabulary, the bare
    /// character for kanji.
    pub fn surface_display(&self) -> String {
        match self {
            Item::Vocab(v) => format!("{} ({})", v.word, v.reading),
            Item::Kanji(k) => k.character.clone(),
        }
    }

    /// Language actually usable for this item: the requested one if it has
    /// meanings, otherwise English.
    pub fn effective_language(&self, requested: Language) -> Language {
        match self.meanings().get(&requested) {
            Some(list) if !list.is_empty() => requested,
            _ => Language::En,
        }
    }

    /// First meaning in the given language, falling back to English.
    pub fn primary_meaning(&self, language: Language) -> Option<&str> {
        let effective = self.effective_language(language);
        self.meanings()
            .get(&effective)
            .and_then(|list| list.first())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meanings(vi: &[&str], en: &[&str]) -> Meanings {
        let mut m = Meanings::new();
        if !vi.is_empty() {
            m.insert(Language::Vi, vi.iter().map(|s| s.to_string()).collect());
        }
        if !en.is_empty() {
            m.insert(Language::En, en.iter().map(|s| s.to_string()).collect());
        }
        m
    }

    fn vocab(word: &str, reading: &str, m: Meanings) -> Item {
        Item::Vocab(VocabItem {
            id: 1,
            word: word.to_string(),
            reading: reading.to_string(),
            meanings: m,
            sino_vietnamese: None,
            jlpt_level: Some(JlptLevel::N5),
            part_of_speech: None,
            tags: vec![],
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn meanings_blob_preserves_non_ascii() {
        let m = meanings(&["từ vựng"], &["word"]);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("từ vựng"));
        let back: Meanings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn effective_language_falls_back_to_english() {
        let item = vocab("単語", "たんご", meanings(&[], &["word"]));
        assert_eq!(item.effective_language(Language::Vi), Language::En);
        assert_eq!(item.primary_meaning(Language::Vi), Some("word"));

        let item = vocab("単語", "たんご", meanings(&["từ vựng"], &["word"]));
        assert_eq!(item.effective_language(Language::Vi), Language::Vi);
        assert_eq!(item.primary_meaning(Language::Vi), Some("từ vựng"));
    }

    #[test]
    fn surface_display_includes_reading_for_vocab() {
        let item = vocab("単語", "たんご", meanings(&["từ vựng"], &[]));
        assert_eq!(item.surface_display(), "単語 (たんご)");
    }

    #[test]
    fn jlpt_level_round_trips_through_str() {
        for level in JlptLevel::all() {
            assert_eq!(JlptLevel::from_str(level.as_str()), Some(level));
        }
        assert_eq!(JlptLevel::from_str("n6"), None);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Egyptian,
    Sumerian,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Egyptian, Language::Sumerian];

    /// Path segment and data file stem.
    pub const fn slug(self) -> &'static str {
        match self {
            Language::Egyptian => "egyptian",
            Language::Sumerian => "sumerian",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Language::Egyptian => "Ancient Egyptian",
            Language::Sumerian => "Sumerian",
        }
    }

    pub const fn glyph_label(self) -> &'static str {
        match self {
            Language::Egyptian => "Hieroglyph",
            Language::Sumerian => "Cuneiform",
        }
    }

    pub const fn classification_label(self) -> &'static str {
        match self {
            Language::Egyptian => "Gardiner",
            Language::Sumerian => "Sign name",
        }
    }

    /// Prefix used when a record arrives without an identifier.
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Language::Egyptian => "EG",
            Language::Sumerian => "SU",
        }
    }

    pub fn data_file_name(self) -> String {
        format!("{}.json", self.slug())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown language {0:?} (expected `egyptian` or `sumerian`)")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "egyptian" | "egy" | "eg" | "hieroglyph" | "hieroglyphs" => Ok(Language::Egyptian),
            "sumerian" | "sux" | "su" | "cuneiform" => Ok(Language::Sumerian),
            _ => Err(UnknownLanguage(value.to_string())),
        }
    }
}

/// One dictionary word in its canonical shape.
///
/// Wire records are normalized into this form when a collection is loaded, so
/// nothing downstream has to care which glyph field or period shape the source
/// used.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Default,
)]
pub struct Entry {
    pub id: String,
    /// Hieroglyph or cuneiform sign, depending on the collection's language.
    pub glyph: String,
    pub transliteration: String,
    pub pronunciation: Option<String>,
    pub meaning: String,
    pub category: String,
    /// Era codes or period ranges, in source order.
    pub periods: Vec<String>,
    /// Gardiner code (Egyptian) or sign name (Sumerian).
    pub classification: Option<String>,
    pub usage: Vec<String>,
    pub notes: Option<String>,
    pub etymology: Option<String>,
}

impl Entry {
    pub fn first_period(&self) -> &str {
        self.periods.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone)]
pub struct BundledCollection {
    pub language: Language,
    pub entries: Vec<Entry>,
}

/// Everything the build script embeds: one fallback collection per language.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, Default)]
pub struct BundledStore {
    pub collections: Vec<BundledCollection>,
}

impl BundledStore {
    pub fn entries_for(&self, language: Language) -> &[Entry] {
        self.collections
            .iter()
            .find(|collection| collection.language == language)
            .map(|collection| collection.entries.as_slice())
            .unwrap_or(&[])
    }
}

//! Wire shape of a language data file (`{ "words": [...] }`) and its
//! normalization into [`Entry`]. Shared with `build.rs`, so it must not reach
//! outside `data`.

use super::data::{Entry, Language};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
pub struct RawCollection {
    #[serde(deserialize_with = "lenient_words")]
    pub words: Vec<RawEntry>,
}

/// One record as found on the wire. Every field is kept as loose JSON and
/// coerced during normalization, so a badly typed field costs that field only.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawEntry {
    pub id: Option<Value>,
    pub hieroglyph: Option<Value>,
    pub cuneiform: Option<Value>,
    pub transliteration: Option<Value>,
    pub pronunciation: Option<Value>,
    pub meaning: Option<Value>,
    pub translation: Option<Value>,
    pub category: Option<Value>,
    pub gardiner: Option<Value>,
    #[serde(alias = "signName")]
    pub sign_name: Option<Value>,
    pub period: Option<Value>,
    pub usage: Option<Value>,
    pub notes: Option<Value>,
    pub etymology: Option<Value>,
}

/// Records that are not objects become empty records.
fn lenient_words<'de, D>(deserializer: D) -> Result<Vec<RawEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| serde_json::from_value::<RawEntry>(value).unwrap_or_default())
        .collect())
}

/// Result of normalizing one collection.
#[derive(Debug, Default)]
pub struct Normalized {
    pub entries: Vec<Entry>,
    /// Identifiers dropped because an earlier record already used them.
    pub duplicate_ids: Vec<String>,
    /// Records that arrived without a usable identifier.
    pub synthesized_ids: usize,
}

pub fn parse_collection(bytes: &[u8], language: Language) -> Result<Normalized, serde_json::Error> {
    let raw: RawCollection = serde_json::from_slice(bytes)?;
    Ok(normalize(language, raw.words))
}

pub fn normalize(language: Language, words: Vec<RawEntry>) -> Normalized {
    let mut seen = HashSet::with_capacity(words.len());
    let mut normalized = Normalized::default();
    for (position, raw) in words.into_iter().enumerate() {
        let id = match scalar_text(raw.id.as_ref()) {
            Some(id) => id,
            None => {
                normalized.synthesized_ids += 1;
                format!("{}{:03}", language.id_prefix(), position + 1)
            }
        };
        if !seen.insert(id.clone()) {
            normalized.duplicate_ids.push(id);
            continue;
        }
        normalized.entries.push(normalize_entry(language, id, raw));
    }
    normalized
}

fn normalize_entry(language: Language, id: String, raw: RawEntry) -> Entry {
    let (glyph, classification) = match language {
        Language::Egyptian => (raw.hieroglyph, raw.gardiner),
        Language::Sumerian => (raw.cuneiform, raw.sign_name),
    };
    Entry {
        id,
        glyph: text(glyph).unwrap_or_default(),
        transliteration: text(raw.transliteration).unwrap_or_default(),
        pronunciation: text(raw.pronunciation),
        meaning: text(raw.meaning)
            .or_else(|| text(raw.translation))
            .unwrap_or_default(),
        category: text(raw.category).unwrap_or_default(),
        periods: list(raw.period),
        classification: text(classification),
        usage: list(raw.usage),
        notes: text(raw.notes),
        etymology: text(raw.etymology),
    }
}

/// Strings and numbers read as text. Anything else counts as missing.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => non_blank(Some(text.clone())),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn text(value: Option<Value>) -> Option<String> {
    scalar_text(value.as_ref())
}

/// A single value is a one-item list. Unusable items are dropped.
fn list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| scalar_text(Some(item)))
            .collect(),
        other => text(other).into_iter().collect(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|text| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == text.len() {
            Some(text)
        } else {
            Some(trimmed.to_string())
        }
    })
}

//! Filter, sort and paginate a language collection.
//!
//! Everything here is a pure function over slices; the caller decides what
//! the page number and page size are.

use crate::collate::CollationKey;
use crate::data::Entry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// `"all"` and blank values select everything; any other value is an
    /// exact category name.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == "all" {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(trimmed.to_string())
        }
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => entry.category == *category,
        }
    }

    pub fn query_value(&self) -> &str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Only(category) => category,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, CategoryFilter::All)
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    None,
    Glyph,
    Transliteration,
    Meaning,
    Classification,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::None,
        SortKey::Glyph,
        SortKey::Transliteration,
        SortKey::Meaning,
        SortKey::Classification,
    ];

    pub fn query_value(self) -> &'static str {
        match self {
            SortKey::None => "none",
            SortKey::Glyph => "glyph",
            SortKey::Transliteration => "transliteration",
            SortKey::Meaning => "meaning",
            SortKey::Classification => "classification",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::None => "Default order",
            SortKey::Glyph => "Glyph",
            SortKey::Transliteration => "Transliteration",
            SortKey::Meaning => "Meaning",
            SortKey::Classification => "Sign code",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort key {0:?}")]
pub struct UnknownSortKey(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "default" => Ok(SortKey::None),
            "glyph" | "hieroglyph" | "cuneiform" => Ok(SortKey::Glyph),
            "transliteration" => Ok(SortKey::Transliteration),
            "meaning" | "translation" => Ok(SortKey::Meaning),
            "classification" | "gardiner" | "sign_name" | "signname" => {
                Ok(SortKey::Classification)
            }
            _ => Err(UnknownSortKey(value.to_string())),
        }
    }
}

/// A bounded slice of an already filtered and sorted collection.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based page number as requested.
    pub number: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<'_, T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 1-based position of the first item on this page, if any.
    pub fn first_position(&self) -> Option<usize> {
        if self.items.is_empty() {
            None
        } else {
            Some((self.number - 1) * self.page_size + 1)
        }
    }

    pub fn last_position(&self) -> Option<usize> {
        self.first_position()
            .map(|first| first + self.items.len() - 1)
    }
}

/// Keeps entries whose category equals the filter, in collection order.
pub fn filter<'a>(entries: &'a [Entry], category: &CategoryFilter) -> Vec<&'a Entry> {
    entries
        .iter()
        .filter(|entry| category.matches(entry))
        .collect()
}

/// Stable sort by `key`. Missing text fields compare as the empty string,
/// except the classification code, whose missing values go last.
pub fn sort<'a>(mut entries: Vec<&'a Entry>, key: SortKey) -> Vec<&'a Entry> {
    match key {
        SortKey::None => {}
        SortKey::Glyph => entries.sort_by_cached_key(|entry| CollationKey::new(&entry.glyph)),
        SortKey::Transliteration => {
            entries.sort_by_cached_key(|entry| CollationKey::new(&entry.transliteration))
        }
        SortKey::Meaning => entries.sort_by_cached_key(|entry| CollationKey::new(&entry.meaning)),
        SortKey::Classification => entries.sort_by_cached_key(|entry| match &entry.classification {
            Some(code) => (false, CollationKey::new(code)),
            None => (true, CollationKey::default()),
        }),
    }
    entries
}

/// Slices `items` into page `page_number` of `page_size` items.
///
/// Page numbers start at 1. Page 0 and pages past the end yield an empty
/// slice; the totals are reported either way.
pub fn paginate<T>(items: &[T], page_number: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let slice = page_number
        .checked_sub(1)
        .and_then(|index| index.checked_mul(page_size))
        .filter(|start| *start < total_items)
        .map(|start| &items[start..(start + page_size).min(total_items)])
        .unwrap_or(&[]);
    Page {
        items: slice,
        number: page_number,
        page_size,
        total_items,
        total_pages,
    }
}

/// Distinct categories with their entry counts, alphabetically.
pub fn categories(entries: &[Entry]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        if entry.category.is_empty() {
            continue;
        }
        *counts.entry(entry.category.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(category, count)| (category.to_string(), count))
        .collect()
}

/// Reads a `page` query value the way the site always has: leading integer,
/// falling back to 1 for anything missing, unparsable or below 1.
pub fn parse_page_param(value: Option<&str>) -> usize {
    let Some(raw) = value else {
        return 1;
    };
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if negative || end == 0 {
        return 1;
    }
    digits[..end].parse::<usize>().unwrap_or(1).max(1)
}

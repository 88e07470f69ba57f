use crate::collate;
use crate::data::{Entry, Language};
use crate::listing::CategoryFilter;
use crate::source::Collection;
use fst::automaton::{Automaton, Str};
use fst::{IntoStreamer, Map, Streamer};
use rapidfuzz::fuzz;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 100;
const TERM_SEPARATOR: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    /// Lowest fuzzy similarity (0.0..=1.0) that still counts as a hit.
    pub min_score: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { min_score: 0.6 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Fuzzy,
    Prefix,
    Substring,
}

impl SearchMode {
    pub fn query_value(self) -> &'static str {
        match self {
            SearchMode::Fuzzy => "fuzzy",
            SearchMode::Prefix => "prefix",
            SearchMode::Substring => "substring",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Fuzzy => write!(f, "Fuzzy"),
            SearchMode::Prefix => write!(f, "Prefix"),
            SearchMode::Substring => write!(f, "Substring"),
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "fuzzy" => Ok(SearchMode::Fuzzy),
            "prefix" => Ok(SearchMode::Prefix),
            "substring" | "contains" => Ok(SearchMode::Substring),
            other => Err(format!("unknown search mode {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub category: CategoryFilter,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            query: query.into(),
            mode,
            category: CategoryFilter::All,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub language: Language,
    pub entry: &'a Entry,
    /// Fuzzy similarity; `None` for prefix and substring matches.
    pub score: Option<f64>,
}

/// fst map from folded search terms to entry positions.
///
/// Keys are `term \0 position`, so the same term may point at several
/// entries and a prefix scan walks them in term order.
pub struct SearchIndex {
    map: Option<Map<Vec<u8>>>,
    terms: usize,
}

impl fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndex")
            .field("terms", &self.terms)
            .finish()
    }
}

impl SearchIndex {
    pub fn build(entries: &[Entry]) -> Self {
        let mut keys: Vec<(Vec<u8>, u64)> = Vec::new();
        for (position, entry) in entries.iter().enumerate() {
            let position = position as u32;
            for term in index_terms(entry) {
                let mut key = term.into_bytes();
                key.push(TERM_SEPARATOR);
                key.extend_from_slice(&position.to_be_bytes());
                keys.push((key, u64::from(position)));
            }
        }
        keys.sort();
        keys.dedup_by(|a, b| a.0 == b.0);
        let terms = keys.len();
        match Map::from_iter(keys) {
            Ok(map) => Self {
                map: Some(map),
                terms,
            },
            Err(err) => {
                warn!(error = %err, "failed to build search index");
                Self {
                    map: None,
                    terms: 0,
                }
            }
        }
    }

    pub fn term_count(&self) -> usize {
        self.terms
    }

    /// Entry positions whose transliteration, sign code or a meaning word
    /// starts with `prefix`, without repeats.
    pub fn prefix(&self, prefix: &str, limit: usize) -> Vec<usize> {
        let folded = collate::fold(prefix.trim());
        let Some(map) = &self.map else {
            return Vec::new();
        };
        if folded.is_empty() || limit == 0 {
            return Vec::new();
        }
        let automaton = Str::new(&folded).starts_with();
        let mut stream = map.search(automaton).into_stream();
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        while let Some((_, value)) = stream.next() {
            let position = value as usize;
            if seen.insert(position) {
                results.push(position);
                if results.len() >= limit {
                    break;
                }
            }
        }
        results
    }
}

fn index_terms(entry: &Entry) -> Vec<String> {
    let mut terms = Vec::new();
    let transliteration = collate::fold(&entry.transliteration);
    if !transliteration.is_empty() {
        terms.push(transliteration);
    }
    if let Some(code) = &entry.classification {
        terms.push(collate::fold(code));
    }
    terms.extend(meaning_words(&entry.meaning));
    terms
}

fn meaning_words(meaning: &str) -> impl Iterator<Item = String> + '_ {
    meaning
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(collate::fold)
}

fn glosses(meaning: &str) -> impl Iterator<Item = String> + '_ {
    meaning
        .split([',', ';'])
        .map(str::trim)
        .filter(|gloss| !gloss.is_empty())
        .map(collate::fold)
}

/// Runs `request` against one collection.
pub fn search<'a>(
    collection: &'a Collection,
    request: &SearchRequest,
    config: &SearchConfig,
) -> Vec<SearchHit<'a>> {
    let limit = request.limit.clamp(1, MAX_SEARCH_LIMIT);
    let entries = collection.entries();
    let language = collection.language();
    let hit = |entry: &'a Entry, score: Option<f64>| SearchHit {
        language,
        entry,
        score,
    };
    match request.mode {
        SearchMode::Prefix => collection
            .search_index()
            .prefix(&request.query, usize::MAX)
            .into_iter()
            .map(|position| &entries[position])
            .filter(|entry| request.category.matches(entry))
            .take(limit)
            .map(|entry| hit(entry, None))
            .collect(),
        SearchMode::Substring => {
            let needle = collate::fold(request.query.trim());
            if needle.is_empty() {
                return Vec::new();
            }
            entries
                .iter()
                .filter(|entry| request.category.matches(entry))
                .filter(|entry| contains_folded(entry, &needle))
                .take(limit)
                .map(|entry| hit(entry, None))
                .collect()
        }
        SearchMode::Fuzzy => {
            let query = collate::fold(request.query.trim());
            if query.is_empty() {
                return Vec::new();
            }
            let mut scored: Vec<(usize, f64)> = entries
                .par_iter()
                .enumerate()
                .filter(|(_, entry)| request.category.matches(entry))
                .filter_map(|(position, entry)| {
                    let score = fuzzy_score(&query, entry);
                    (score >= config.min_score).then_some((position, score))
                })
                .collect();
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| {
                    collate::compare(&entries[a.0].transliteration, &entries[b.0].transliteration)
                })
            });
            scored
                .into_iter()
                .take(limit)
                .map(|(position, score)| hit(&entries[position], Some(score)))
                .collect()
        }
    }
}

/// Runs `request` against several collections. Fuzzy hits are merged by
/// score; other modes keep collection order.
pub fn search_many<'a, I>(
    collections: I,
    request: &SearchRequest,
    config: &SearchConfig,
) -> Vec<SearchHit<'a>>
where
    I: IntoIterator<Item = &'a Collection>,
{
    let limit = request.limit.clamp(1, MAX_SEARCH_LIMIT);
    let mut hits: Vec<SearchHit<'a>> = collections
        .into_iter()
        .flat_map(|collection| search(collection, request, config))
        .collect();
    if request.mode == SearchMode::Fuzzy {
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
        });
    }
    hits.truncate(limit);
    hits
}

fn contains_folded(entry: &Entry, needle: &str) -> bool {
    collate::fold(&entry.transliteration).contains(needle)
        || collate::fold(&entry.meaning).contains(needle)
        || entry
            .classification
            .as_deref()
            .is_some_and(|code| collate::fold(code).contains(needle))
}

fn fuzzy_score(query: &str, entry: &Entry) -> f64 {
    let transliteration = collate::fold(&entry.transliteration);
    let mut best = fuzz::ratio(query.chars(), transliteration.chars());
    for gloss in glosses(&entry.meaning) {
        let score = fuzz::ratio(query.chars(), gloss.chars());
        if score > best {
            best = score;
        }
    }
    best
}

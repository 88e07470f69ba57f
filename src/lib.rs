mod data;
mod raw;

pub mod catalog;
pub mod collate;
pub mod config;
pub mod favorites;
pub mod listing;
pub mod render;
pub mod search;
pub mod source;
pub mod view;
#[cfg(feature = "web")]
pub mod web;

pub use data::{Entry, Language, UnknownLanguage};

use data::BundledStore;
use once_cell::sync::Lazy;
use rkyv::util::AlignedVec;
use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};
use zstd::stream::decode_all;

static BUNDLE_BYTES: &[u8] = include_bytes!(env!("LEXICON_BUNDLE"));

static BUNDLED: Lazy<BundledStore> = Lazy::new(|| {
    let decompressed =
        decode_all(Cursor::new(BUNDLE_BYTES)).expect("decompress bundled collections");
    let mut aligned: AlignedVec = AlignedVec::with_capacity(decompressed.len());
    aligned.extend_from_slice(&decompressed);
    rkyv::from_bytes::<BundledStore, rkyv::rancor::Error>(aligned.as_slice())
        .expect("bundled collections are a valid archive")
});

/// The fallback collection compiled into the binary for `language`.
pub fn bundled_entries(language: Language) -> &'static [Entry] {
    BUNDLED.entries_for(language)
}

/// Whole days since the Unix epoch, used to pick the entry of the day.
pub fn day_number(now: SystemTime) -> u64 {
    now.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() / 86_400)
        .unwrap_or(0)
}

/// Same entry all day, a different one tomorrow.
pub fn entry_of_the_day(entries: &[Entry], day: u64) -> Option<&Entry> {
    if entries.is_empty() {
        return None;
    }
    entries.get((day % entries.len() as u64) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bundled_collections_are_embedded() {
        let egyptian = bundled_entries(Language::Egyptian);
        let sumerian = bundled_entries(Language::Sumerian);
        assert_eq!(egyptian.len(), 12);
        assert_eq!(sumerian.len(), 11);
        assert_eq!(egyptian[0].id, "EG001");
        assert!(sumerian.iter().all(|entry| entry.id.starts_with("SU")));
        assert!(egyptian.iter().all(|entry| !entry.glyph.is_empty()));
    }

    #[test]
    fn bundled_shapes_are_normalized() {
        let eg012 = bundled_entries(Language::Egyptian)
            .iter()
            .find(|entry| entry.id == "EG012")
            .unwrap();
        assert!(!eg012.meaning.is_empty());
        assert_eq!(eg012.periods.len(), 1);
        assert_eq!(eg012.classification, None);
    }

    #[test]
    fn language_names_parse_with_aliases() {
        assert_eq!("Cuneiform".parse::<Language>().unwrap(), Language::Sumerian);
        let err = "latin".parse::<Language>().unwrap_err();
        assert_eq!(err, UnknownLanguage("latin".into()));
        assert_eq!(
            err.to_string(),
            r#"unknown language "latin" (expected `egyptian` or `sumerian`)"#
        );
    }

    #[test]
    fn entry_of_the_day_wraps_around() {
        let entries = bundled_entries(Language::Sumerian);
        assert_eq!(entry_of_the_day(entries, 0).unwrap().id, entries[0].id);
        assert_eq!(
            entry_of_the_day(entries, entries.len() as u64 + 2).unwrap().id,
            entries[2].id
        );
        assert!(entry_of_the_day(&[], 5).is_none());
    }

    #[test]
    fn day_number_counts_whole_days() {
        let now = UNIX_EPOCH + Duration::from_secs(3 * 86_400 + 5);
        assert_eq!(day_number(now), 3);
    }
}

//! Locale-aware string ordering for transliterations and glosses.
//!
//! Comparison runs in three levels, like a default collator: base letters
//! (diacritics and case ignored), then diacritics, then case with lowercase
//! first. `ḥtp` therefore sorts next to `htp`, not after `z`.

use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct CollationKey {
    primary: String,
    secondary: String,
    tertiary: Vec<(bool, char)>,
}

impl CollationKey {
    pub fn new(value: &str) -> Self {
        let decomposed: String = value.nfd().collect();
        let primary = decomposed
            .chars()
            .filter(|ch| !is_combining_mark(*ch))
            .flat_map(char::to_lowercase)
            .collect();
        let secondary = decomposed.chars().flat_map(char::to_lowercase).collect();
        let tertiary = decomposed
            .chars()
            .map(|ch| (ch.is_uppercase(), ch))
            .collect();
        Self {
            primary,
            secondary,
            tertiary,
        }
    }
}

pub fn compare(a: &str, b: &str) -> Ordering {
    CollationKey::new(a).cmp(&CollationKey::new(b))
}

/// Primary-level form: decomposed, combining marks dropped, lowercased.
pub fn fold(value: &str) -> String {
    value
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diacritics_sort_with_their_base_letter() {
        let mut words = vec!["zꜣ", "ḥtp", "hnw", "hb"];
        words.sort_by(|a, b| compare(a, b));
        assert_eq!(words, vec!["hb", "hnw", "ḥtp", "zꜣ"]);
    }

    #[test]
    fn case_is_a_late_tiebreak() {
        assert_eq!(compare("an", "An"), Ordering::Less);
        assert_eq!(compare("An", "ki"), Ordering::Less);
        assert_eq!(compare("b", "B"), Ordering::Less);
    }

    #[test]
    fn plain_letter_precedes_accented_twin() {
        assert_eq!(compare("htp", "ḥtp"), Ordering::Less);
        assert_eq!(compare("ḥtp", "ḥtp"), Ordering::Equal);
    }

    #[test]
    fn empty_sorts_first() {
        assert_eq!(compare("", "a"), Ordering::Less);
    }

    #[test]
    fn fold_strips_marks_and_case() {
        assert_eq!(fold("Ḥtp"), "htp");
        assert_eq!(fold("e₂"), "e₂");
        assert_eq!(fold("ꜥnḫ"), "ꜥnh");
    }
}

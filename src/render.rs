//! Turns a page of entries into a description of what to show.
//!
//! Nothing here writes output. The CLI prints these values, the web service
//! feeds them to templates or serializes them as JSON.

use crate::data::Entry;
use crate::favorites::Favorites;
use crate::listing::Page;
use serde::Serialize;

/// Numbered links shown around the current page.
pub const PAGINATION_WINDOW: usize = 5;
pub const NO_RESULTS_MESSAGE: &str = "No words found";

/// One entry as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "web", derive(utoipa::ToSchema))]
pub struct EntryCard {
    pub id: String,
    pub glyph: String,
    pub transliteration: String,
    pub meaning: String,
    pub category: String,
    /// First period only; the detail view lists them all.
    pub period: String,
    pub classification: String,
    pub usage: Vec<String>,
    pub favorite: bool,
}

impl EntryCard {
    pub fn new(entry: &Entry, favorite: bool) -> Self {
        Self {
            id: entry.id.clone(),
            glyph: entry.glyph.clone(),
            transliteration: entry.transliteration.clone(),
            meaning: entry.meaning.clone(),
            category: entry.category.clone(),
            period: entry.first_period().to_string(),
            classification: entry.classification.clone().unwrap_or_default(),
            usage: entry.usage.clone(),
            favorite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "cards", rename_all = "snake_case")]
pub enum ListingBody {
    Cards(Vec<EntryCard>),
    NoResults,
}

impl ListingBody {
    pub fn cards(&self) -> &[EntryCard] {
        match self {
            ListingBody::Cards(cards) => cards,
            ListingBody::NoResults => &[],
        }
    }
}

/// Cards for every entry on `page`, or the placeholder when it is empty.
pub fn render_page(page: &Page<'_, &Entry>, favorites: &Favorites) -> ListingBody {
    if page.is_empty() {
        return ListingBody::NoResults;
    }
    ListingBody::Cards(
        page.items
            .iter()
            .map(|entry| EntryCard::new(entry, favorites.contains(&entry.id)))
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaginationItem {
    Previous { page: usize },
    Page { page: usize, current: bool },
    Ellipsis,
    Next { page: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationControls {
    pub items: Vec<PaginationItem>,
    pub summary: String,
}

/// Previous link, a window of up to five page links around `current`, first
/// and last page links with ellipses when the window stops short of them,
/// and a next link.
pub fn render_pagination_controls(
    current: usize,
    total_pages: usize,
    page_size: usize,
) -> PaginationControls {
    let mut items = Vec::new();
    if current > 1 {
        items.push(PaginationItem::Previous { page: current - 1 });
    }

    let mut start = current.saturating_sub(2).max(1);
    let end = total_pages.min(start + PAGINATION_WINDOW - 1);
    if end + 1 < start + PAGINATION_WINDOW {
        start = end.saturating_sub(PAGINATION_WINDOW - 1).max(1);
    }

    if start > 1 {
        items.push(PaginationItem::Page {
            page: 1,
            current: current == 1,
        });
        if start > 2 {
            items.push(PaginationItem::Ellipsis);
        }
    }
    for page in start..=end {
        items.push(PaginationItem::Page {
            page,
            current: page == current,
        });
    }
    if end < total_pages {
        if end + 1 < total_pages {
            items.push(PaginationItem::Ellipsis);
        }
        items.push(PaginationItem::Page {
            page: total_pages,
            current: current == total_pages,
        });
    }

    if current < total_pages {
        items.push(PaginationItem::Next { page: current + 1 });
    }

    PaginationControls {
        items,
        summary: format!("Page {current} of {total_pages} ({page_size} words per page)"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub first: usize,
    pub last: usize,
    pub total: usize,
    pub text: String,
}

pub fn page_info<T>(page: &Page<'_, T>) -> PageInfo {
    let total = page.total_items;
    match (page.first_position(), page.last_position()) {
        (Some(first), Some(last)) => PageInfo {
            first,
            last,
            total,
            text: format!("Showing {first}-{last} of {total} words"),
        },
        _ => PageInfo {
            first: 0,
            last: 0,
            total,
            text: format!("Showing 0 of {total} words"),
        },
    }
}

/// Every field of one entry, ready for a detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "web", derive(utoipa::ToSchema))]
pub struct EntryDetail {
    pub id: String,
    pub glyph: String,
    pub transliteration: String,
    pub pronunciation: Option<String>,
    pub meaning: String,
    pub category: String,
    pub periods: String,
    pub classification: Option<String>,
    pub usage: Vec<String>,
    pub notes: Option<String>,
    pub etymology: Option<String>,
    pub favorite: bool,
}

impl EntryDetail {
    pub fn new(entry: &Entry, favorite: bool) -> Self {
        Self {
            id: entry.id.clone(),
            glyph: entry.glyph.clone(),
            transliteration: entry.transliteration.clone(),
            pronunciation: entry.pronunciation.clone(),
            meaning: entry.meaning.clone(),
            category: entry.category.clone(),
            periods: entry.periods.join(", "),
            classification: entry.classification.clone(),
            usage: entry.usage.clone(),
            notes: entry.notes.clone(),
            etymology: entry.etymology.clone(),
            favorite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::paginate;

    fn numbers(controls: &PaginationControls) -> Vec<String> {
        controls
            .items
            .iter()
            .map(|item| match item {
                PaginationItem::Previous { .. } => "<".to_string(),
                PaginationItem::Next { .. } => ">".to_string(),
                PaginationItem::Ellipsis => "…".to_string(),
                PaginationItem::Page { page, current: true } => format!("[{page}]"),
                PaginationItem::Page { page, .. } => page.to_string(),
            })
            .collect()
    }

    #[test]
    fn first_page_has_no_previous_link() {
        let controls = render_pagination_controls(1, 10, 20);
        assert_eq!(numbers(&controls), ["[1]", "2", "3", "4", "5", "…", "10", ">"]);
        assert_eq!(controls.summary, "Page 1 of 10 (20 words per page)");
    }

    #[test]
    fn middle_page_shows_both_ellipses() {
        let controls = render_pagination_controls(6, 12, 20);
        assert_eq!(
            numbers(&controls),
            ["<", "1", "…", "4", "5", "[6]", "7", "8", "…", "12", ">"]
        );
    }

    #[test]
    fn window_slides_back_near_the_end() {
        let controls = render_pagination_controls(10, 10, 20);
        assert_eq!(numbers(&controls), ["<", "1", "…", "6", "7", "8", "9", "[10]"]);
    }

    #[test]
    fn adjacent_edges_skip_the_ellipsis() {
        let controls = render_pagination_controls(4, 7, 20);
        assert_eq!(numbers(&controls), ["<", "1", "2", "3", "[4]", "5", "6", "7", ">"]);
    }

    #[test]
    fn short_collections_show_every_page() {
        assert_eq!(numbers(&render_pagination_controls(2, 3, 20)), ["<", "1", "[2]", "3", ">"]);
        assert_eq!(numbers(&render_pagination_controls(1, 1, 20)), ["[1]"]);
    }

    #[test]
    fn empty_collection_summary() {
        let controls = render_pagination_controls(1, 0, 20);
        assert!(controls.items.is_empty());
        assert_eq!(controls.summary, "Page 1 of 0 (20 words per page)");
    }

    #[test]
    fn empty_page_renders_placeholder() {
        let entries: Vec<&Entry> = Vec::new();
        let page = paginate(&entries, 1, 20);
        assert_eq!(render_page(&page, &Favorites::new()), ListingBody::NoResults);
        assert_eq!(page_info(&page).text, "Showing 0 of 0 words");
    }

    #[test]
    fn cards_fill_missing_fields_and_mark_favorites() {
        let a = Entry {
            id: "EG001".into(),
            meaning: "life".into(),
            periods: vec!["OK".into(), "MK".into()],
            ..Entry::default()
        };
        let b = Entry {
            id: "EG002".into(),
            classification: Some("R8".into()),
            ..Entry::default()
        };
        let entries = vec![&a, &b];
        let page = paginate(&entries, 1, 20);
        let mut favorites = Favorites::new();
        favorites.toggle("EG002");
        let body = render_page(&page, &favorites);
        let cards = body.cards();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].period, "OK");
        assert_eq!(cards[0].classification, "");
        assert!(!cards[0].favorite);
        assert!(cards[1].favorite);
        assert_eq!(cards[1].period, "");
        assert_eq!(EntryDetail::new(&a, false).periods, "OK, MK");
    }

    #[test]
    fn page_info_counts_positions() {
        let entries: Vec<u32> = (0..45).collect();
        assert_eq!(page_info(&paginate(&entries, 3, 20)).text, "Showing 41-45 of 45 words");
        assert_eq!(page_info(&paginate(&entries, 4, 20)).text, "Showing 0 of 45 words");
    }
}

//! Listing state and the reducer that moves it between user actions.

use crate::data::Language;
use crate::favorites::Favorites;
use crate::listing::{self, CategoryFilter, DEFAULT_PAGE_SIZE, SortKey};
use crate::render::{self, ListingBody, PageInfo, PaginationControls};
use crate::source::{Collection, Origin};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Page, category and sort as they travel in a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub page: usize,
    pub category: CategoryFilter,
    pub sort: SortKey,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            page: 1,
            category: CategoryFilter::All,
            sort: SortKey::None,
        }
    }
}

impl ListingQuery {
    /// Reads raw query values. Unknown sort keys fall back to input order.
    pub fn from_params(page: Option<&str>, category: Option<&str>, sort: Option<&str>) -> Self {
        let sort = match sort.map(str::parse::<SortKey>) {
            Some(Ok(key)) => key,
            Some(Err(err)) => {
                debug!(error = %err, "ignoring sort parameter");
                SortKey::None
            }
            None => SortKey::None,
        };
        Self {
            page: listing::parse_page_param(page),
            category: category.map(CategoryFilter::parse).unwrap_or_default(),
            sort,
        }
    }

    pub fn with_page(&self, page: usize) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    pub fn with_category(&self, category: CategoryFilter) -> Self {
        Self {
            page: 1,
            category,
            sort: self.sort,
        }
    }

    pub fn with_sort(&self, sort: SortKey) -> Self {
        Self {
            page: 1,
            category: self.category.clone(),
            sort,
        }
    }

    /// `?page=…&category=…&sort=…`, leaving out defaults. Empty when all
    /// three are defaults.
    pub fn query_string(&self) -> String {
        let mut pairs = Vec::new();
        if self.page > 1 {
            pairs.push(format!("page={}", self.page));
        }
        if !self.category.is_all() {
            pairs.push(format!(
                "category={}",
                utf8_percent_encode(self.category.query_value(), NON_ALPHANUMERIC)
            ));
        }
        if self.sort != SortKey::None {
            pairs.push(format!("sort={}", self.sort.query_value()));
        }
        if pairs.is_empty() {
            String::new()
        } else {
            format!("?{}", pairs.join("&"))
        }
    }

    pub fn href(&self, language: Language) -> String {
        format!("/words/{}{}", language.slug(), self.query_string())
    }
}

/// The four things that change a listing.
#[derive(Debug, Clone)]
pub enum ViewAction {
    CollectionLoaded(Arc<Collection>),
    CategorySelected(CategoryFilter),
    SortSelected(SortKey),
    PageSelected(usize),
}

#[derive(Debug, Clone)]
pub struct ViewState {
    collection: Arc<Collection>,
    query: ListingQuery,
    page_size: usize,
}

impl ViewState {
    pub fn new(collection: Arc<Collection>, page_size: usize) -> Self {
        Self {
            collection,
            query: ListingQuery::default(),
            page_size: page_size.max(1),
        }
    }

    pub fn with_query(mut self, query: ListingQuery) -> Self {
        self.query = ListingQuery {
            page: query.page.max(1),
            ..query
        };
        self
    }

    pub fn language(&self) -> Language {
        self.collection.language()
    }

    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    pub fn query(&self) -> &ListingQuery {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.query.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the state after `action`.
    ///
    /// A collection for another language starts over from page 1 with no
    /// filter. A collection older than the one already held is ignored.
    pub fn apply(self, action: ViewAction) -> Self {
        match action {
            ViewAction::CollectionLoaded(collection) => {
                if collection.language() != self.language() {
                    return Self::new(collection, self.page_size);
                }
                if collection.generation() < self.collection.generation() {
                    debug!(
                        language = %collection.language(),
                        stale = collection.generation(),
                        held = self.collection.generation(),
                        "ignoring superseded collection"
                    );
                    return self;
                }
                Self { collection, ..self }
            }
            ViewAction::CategorySelected(category) => Self {
                query: self.query.with_category(category),
                ..self
            },
            ViewAction::SortSelected(sort) => Self {
                query: self.query.with_sort(sort),
                ..self
            },
            ViewAction::PageSelected(page) => Self {
                query: self.query.with_page(page),
                ..self
            },
        }
    }

    /// Runs filter, sort, paginate and render over the full collection.
    pub fn render(&self, favorites: &Favorites) -> ListingView {
        let entries = self.collection.entries();
        let filtered = listing::filter(entries, &self.query.category);
        let sorted = listing::sort(filtered, self.query.sort);
        let page = listing::paginate(&sorted, self.query.page, self.page_size);
        ListingView {
            language: self.language(),
            origin: self.collection.origin(),
            body: render::render_page(&page, favorites),
            controls: render::render_pagination_controls(
                self.query.page,
                page.total_pages,
                self.page_size,
            ),
            info: render::page_info(&page),
            categories: listing::categories(entries),
            category: self.query.category.query_value().to_string(),
            sort: self.query.sort,
            page: self.query.page,
            total_pages: page.total_pages,
        }
    }
}

/// Everything needed to draw one listing page.
#[derive(Debug, Clone, Serialize)]
pub struct ListingView {
    pub language: Language,
    pub origin: Origin,
    pub body: ListingBody,
    pub controls: PaginationControls,
    pub info: PageInfo,
    pub categories: Vec<(String, usize)>,
    pub category: String,
    pub sort: SortKey,
    pub page: usize,
    pub total_pages: usize,
}

/// Builds a listing state straight from URL values.
pub fn view_for(
    collection: Arc<Collection>,
    query: ListingQuery,
    page_size: Option<usize>,
) -> ViewState {
    ViewState::new(collection, page_size.unwrap_or(DEFAULT_PAGE_SIZE)).with_query(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Entry;

    fn entry(id: &str, category: &str, transliteration: &str) -> Entry {
        Entry {
            id: id.into(),
            category: category.into(),
            transliteration: transliteration.into(),
            ..Entry::default()
        }
    }

    fn collection(language: Language, generation: u64, count: usize) -> Arc<Collection> {
        let entries = (0..count)
            .map(|i| entry(&format!("X{i:03}"), if i % 2 == 0 { "x" } else { "y" }, "a"))
            .collect();
        Arc::new(Collection::new(language, Origin::Bundled, entries).with_generation(generation))
    }

    #[test]
    fn filter_and_sort_reset_page() {
        let state = ViewState::new(collection(Language::Egyptian, 1, 45), 20)
            .apply(ViewAction::PageSelected(3));
        assert_eq!(state.page(), 3);
        let state = state.apply(ViewAction::CategorySelected(CategoryFilter::parse("x")));
        assert_eq!(state.page(), 1);
        let state = state
            .apply(ViewAction::PageSelected(2))
            .apply(ViewAction::SortSelected(SortKey::Meaning));
        assert_eq!(state.page(), 1);
        assert_eq!(state.query().category, CategoryFilter::Only("x".into()));
    }

    #[test]
    fn page_selection_is_clamped_to_one() {
        let state = ViewState::new(collection(Language::Egyptian, 1, 5), 20)
            .apply(ViewAction::PageSelected(0));
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn stale_collection_is_ignored() {
        let state = ViewState::new(collection(Language::Sumerian, 4, 3), 20);
        let state = state.apply(ViewAction::CollectionLoaded(collection(Language::Sumerian, 2, 9)));
        assert_eq!(state.collection().len(), 3);
        let state = state.apply(ViewAction::CollectionLoaded(collection(Language::Sumerian, 5, 9)));
        assert_eq!(state.collection().len(), 9);
    }

    #[test]
    fn language_switch_starts_over() {
        let state = ViewState::new(collection(Language::Egyptian, 3, 45), 20)
            .apply(ViewAction::CategorySelected(CategoryFilter::parse("y")))
            .apply(ViewAction::PageSelected(2))
            .apply(ViewAction::CollectionLoaded(collection(Language::Sumerian, 1, 4)));
        assert_eq!(state.language(), Language::Sumerian);
        assert_eq!(state.page(), 1);
        assert!(state.query().category.is_all());
    }

    #[test]
    fn render_runs_whole_pipeline() {
        let state = ViewState::new(collection(Language::Egyptian, 1, 45), 20);
        let view = state.render(&Favorites::new());
        assert_eq!(view.total_pages, 3);
        assert_eq!(view.body.cards().len(), 20);
        assert_eq!(view.info.text, "Showing 1-20 of 45 words");

        let view = state
            .clone()
            .apply(ViewAction::PageSelected(3))
            .render(&Favorites::new());
        assert_eq!(view.body.cards().len(), 5);

        let view = state
            .apply(ViewAction::PageSelected(9))
            .render(&Favorites::new());
        assert_eq!(view.body, ListingBody::NoResults);
        assert_eq!(view.total_pages, 3);
    }

    #[test]
    fn filtered_example_fits_one_page() {
        let entries = vec![entry("A", "x", "a"), entry("B", "y", "b"), entry("C", "x", "c")];
        let collection = Arc::new(Collection::new(Language::Egyptian, Origin::Bundled, entries));
        let view = ViewState::new(collection, 2)
            .apply(ViewAction::CategorySelected(CategoryFilter::parse("x")))
            .render(&Favorites::new());
        let ids: Vec<&str> = view.body.cards().iter().map(|card| card.id.as_str()).collect();
        assert_eq!(ids, ["A", "C"]);
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.categories, vec![("x".to_string(), 2), ("y".to_string(), 1)]);
    }

    #[test]
    fn query_round_trips_through_href() {
        let query = ListingQuery::from_params(Some("2abc"), Some("daily life"), Some("gardiner"));
        assert_eq!(query.page, 2);
        assert_eq!(query.sort, SortKey::Classification);
        assert_eq!(
            query.href(Language::Egyptian),
            "/words/egyptian?page=2&category=daily%20life&sort=classification"
        );
        assert_eq!(ListingQuery::default().href(Language::Sumerian), "/words/sumerian");
        let next = query.with_category(CategoryFilter::All);
        assert_eq!(next.query_string(), "?sort=classification");
    }

    #[test]
    fn unknown_sort_falls_back_to_input_order() {
        let query = ListingQuery::from_params(None, None, Some("colour"));
        assert_eq!(query.sort, SortKey::None);
        assert_eq!(query.page, 1);
    }
}

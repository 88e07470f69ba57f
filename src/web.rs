use crate::catalog::Catalog;
use crate::config::LexiconConfig;
use crate::favorites::Favorites;
use crate::listing::{CategoryFilter, SortKey};
use crate::render::{EntryCard, EntryDetail, NO_RESULTS_MESSAGE, PaginationItem};
use crate::search::{self, MAX_SEARCH_LIMIT, SearchConfig, SearchMode, SearchRequest};
use crate::source::{Collection, EntryLoader};
use crate::view::{ListingQuery, ListingView, ViewState};
use crate::{Entry, Language, day_number, entry_of_the_day};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use cookie::{Cookie, SameSite};
use include_dir::{Dir, include_dir};
use lru::LruCache;
use markdown::{Options as MarkdownOptions, to_html_with_options};
use parking_lot::Mutex;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

type SharedState = Arc<AppState>;

pub const FAVORITES_COOKIE: &str = "wordFavorites";
/// Largest `wordFavorites` value written. Browsers drop cookies past 4096
/// bytes, attributes included.
pub const MAX_FAVORITES_COOKIE_BYTES: usize = 3900;
const SEARCH_CACHE_CAPACITY: usize = 256;

static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/assets");

pub struct AppState {
    pub catalog: Catalog,
    pub theme: WebTheme,
    pub base_url: String,
    pub page_size: usize,
    pub search: SearchConfig,
    search_cache: Mutex<LruCache<SearchCacheKey, SearchResponsePayload>>,
}

impl AppState {
    pub fn new(lexicon: LexiconConfig, theme: WebTheme, base_url: impl Into<String>) -> Self {
        let capacity = NonZeroUsize::new(SEARCH_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            catalog: Catalog::new(EntryLoader::new(lexicon.source)),
            theme,
            base_url: base_url.into(),
            page_size: lexicon.page_size,
            search: lexicon.search,
            search_cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

impl std::str::FromStr for WebTheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tailwind" => Ok(WebTheme::Tailwind),
            "bootstrap" => Ok(WebTheme::Bootstrap),
            other => Err(format!(
                "unknown theme {other:?} (expected `tailwind` or `bootstrap`)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    head: &'static str,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    cta_group_class: &'static str,
    button_class: &'static str,
    pill_class: &'static str,
    pill_active_class: &'static str,
    entry_card_class: &'static str,
    glyph_class: &'static str,
}

const TAILWIND_HEAD: &str = r#"<script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    <link href="/assets/lexicon.css" rel="stylesheet">"#;
const BOOTSTRAP_HEAD: &str = r#"<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    <link href="/assets/lexicon.css" rel="stylesheet">"#;

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                head: TAILWIND_HEAD,
                body_class: "bg-amber-50 text-stone-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-5xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-stone-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-stone-600",
                cta_group_class: "flex flex-wrap gap-3",
                button_class: "inline-flex items-center rounded-md bg-stone-900 px-4 py-2 text-white font-semibold shadow hover:bg-stone-700 transition-colors",
                pill_class: "px-3 py-1 rounded-full bg-stone-200 hover:bg-stone-300 text-sm",
                pill_active_class: "px-3 py-1 rounded-full bg-stone-900 text-white text-sm",
                entry_card_class: "bg-white shadow rounded p-4 space-y-2",
                glyph_class: "lexicon-glyph text-5xl",
            },
            WebTheme::Bootstrap => Self {
                head: BOOTSTRAP_HEAD,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-10",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                cta_group_class: "d-flex flex-wrap gap-3",
                button_class: "btn btn-primary btn-lg px-4 py-2",
                pill_class: "btn btn-outline-secondary btn-sm",
                pill_active_class: "btn btn-secondary btn-sm",
                entry_card_class: "card card-body h-100",
                glyph_class: "lexicon-glyph display-4",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub enable_openapi: bool,
    pub theme: WebTheme,
    pub base_url: String,
    pub lexicon: LexiconConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_openapi: true,
            theme: WebTheme::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
            lexicon: LexiconConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let source = config.lexicon.source.clone();
    let state = Arc::new(AppState::new(
        config.lexicon,
        config.theme,
        config.base_url.clone(),
    ));
    let router = build_router(state, config.enable_openapi);
    info!(
        %config.addr,
        theme = %config.theme,
        openapi = config.enable_openapi,
        base = %config.base_url,
        %source,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct ErrorPayload {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn too_large(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = ErrorPayload {
            error: self.message,
        };
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState, openapi: bool) -> Router {
    let mut router = Router::new()
        .route("/", get(home))
        .route("/words/:language", get(listing_html))
        .route("/words/:language/:id", get(entry_html))
        .route("/search", get(search_html))
        .route("/favorites", get(favorites_html))
        .route("/favorites/:language/:id", post(toggle_favorite))
        .route("/api/words/:language", get(api_words))
        .route("/api/words/:language/:id", get(api_entry))
        .route("/api/search", get(api_search))
        .route("/api/favorites", get(api_favorites))
        .route("/api/random", get(api_random))
        .route("/api/reload/:language", post(api_reload))
        .route("/healthz", get(health))
        .route("/sitemap.xml", get(sitemap_xml))
        .route("/assets/*path", get(asset));
    if openapi {
        router = router.route("/api/openapi.json", get(openapi_json));
    }
    router
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(api_words, api_entry, api_search, api_favorites, api_random, api_reload),
    components(schemas(
        ListingPayload,
        CategoryPayload,
        EntryCard,
        EntryDetail,
        EntryPayload,
        SearchResponsePayload,
        SearchHitPayload,
        FavoritePayload,
        ReloadPayload,
        ErrorPayload
    )),
    tags((name = "lexicon", description = "Egyptian and Sumerian word lists"))
)]
struct ApiDoc;

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn home(State(state): State<SharedState>) -> impl IntoResponse {
    let day = day_number(SystemTime::now());
    let mut sections = Vec::new();
    for language in Language::ALL {
        let collection = state.catalog.collection(language).await;
        sections.push(HomeSection {
            language,
            count: collection.len(),
            featured: entry_of_the_day(collection.entries(), day).cloned(),
        });
    }
    Html(render_home(state.theme, &state.base_url, &sections))
}

struct HomeSection {
    language: Language,
    count: usize,
    featured: Option<Entry>,
}

fn render_home(theme: WebTheme, base_url: &str, sections: &[HomeSection]) -> String {
    let chrome = Chrome::new(theme);
    let title = "Ancient Lexicon";
    let intro = "Hieroglyphs and cuneiform signs with their transliterations, meanings and periods.";
    let mut cards = String::new();
    for section in sections {
        let language = section.language;
        let featured = match &section.featured {
            Some(entry) => format!(
                r#"<p class="text-sm text-stone-500 mb-1">Word of the day</p>
            <a href="{href}"><span class="{glyph_class}">{glyph}</span> <strong>{transliteration}</strong></a>
            <p>{meaning}</p>"#,
                href = entry_path(language, &entry.id),
                glyph_class = chrome.glyph_class,
                glyph = xml_escape(&entry.glyph),
                transliteration = xml_escape(&entry.transliteration),
                meaning = xml_escape(&entry.meaning),
            ),
            None => String::new(),
        };
        cards.push_str(&format!(
            r#"
          <div class="{entry_card_class}">
            <h2 class="text-2xl font-semibold">{name}</h2>
            <p>{count} words</p>
            {featured}
            <a href="/words/{slug}" class="{button_class}">Browse {name}</a>
          </div>"#,
            entry_card_class = chrome.entry_card_class,
            name = language.display_name(),
            count = section.count,
            slug = language.slug(),
            button_class = chrome.button_class,
        ));
    }
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{title}</title>
    {head}
    <script type="application/ld+json">
{site_json_ld}
    </script>
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class} space-y-6">
        <div>
          <p class="{eyebrow_class}">Ancient Lexicon v{version}</p>
          <h1 class="{headline_class}">Egyptian and Sumerian words</h1>
          <p class="{lede_class}">{intro}</p>
        </div>
        <div class="grid gap-4 md:grid-cols-2 row row-cols-1 row-cols-md-2 g-3">{cards}
        </div>
        <div class="{cta_group}">
          <a href="/search" class="{button_class}">Search</a>
          <a href="/favorites" class="{button_class}">Favorites</a>
        </div>
      </div>
    </main>
  </body>
</html>"#,
        head = chrome.head,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        eyebrow_class = chrome.eyebrow_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        cta_group = chrome.cta_group_class,
        button_class = chrome.button_class,
        version = env!("CARGO_PKG_VERSION"),
        site_json_ld = indent_json(&website_json_ld(base_url), 4),
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "ancient-lexicon-web" }))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListingParams {
    /// 1-based page number; anything unparsable means page 1.
    page: Option<String>,
    /// Exact category name, or `all`.
    category: Option<String>,
    /// `glyph`, `transliteration`, `meaning` or `classification`.
    sort: Option<String>,
}

impl ListingParams {
    fn to_query(&self) -> ListingQuery {
        ListingQuery::from_params(
            self.page.as_deref(),
            self.category.as_deref(),
            self.sort.as_deref(),
        )
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct SearchParams {
    q: Option<String>,
    /// `fuzzy` (default), `prefix` or `substring`.
    mode: Option<String>,
    /// `egyptian`, `sumerian` or `all` (default).
    language: Option<String>,
    category: Option<String>,
    /// 1 to 100, default 10.
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct RandomParams {
    /// Defaults to a random language.
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToggleParams {
    return_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct CategoryPayload {
    name: String,
    count: usize,
    href: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
struct ListingPayload {
    language: String,
    origin: String,
    page: usize,
    page_size: usize,
    total_pages: usize,
    total_items: usize,
    category: String,
    sort: String,
    summary: String,
    info: String,
    entries: Vec<EntryCard>,
    categories: Vec<CategoryPayload>,
    previous: Option<String>,
    next: Option<String>,
}

impl ListingPayload {
    fn from_view(view: &ListingView, query: &ListingQuery, page_size: usize) -> Self {
        let language = view.language;
        let mut previous = None;
        let mut next = None;
        for item in &view.controls.items {
            match item {
                PaginationItem::Previous { page } => {
                    previous = Some(query.with_page(*page).href(language))
                }
                PaginationItem::Next { page } => next = Some(query.with_page(*page).href(language)),
                _ => {}
            }
        }
        Self {
            language: language.slug().to_string(),
            origin: view.origin.to_string(),
            page: view.page,
            page_size,
            total_pages: view.total_pages,
            total_items: view.info.total,
            category: view.category.clone(),
            sort: view.sort.query_value().to_string(),
            summary: view.controls.summary.clone(),
            info: view.info.text.clone(),
            entries: view.body.cards().to_vec(),
            categories: view
                .categories
                .iter()
                .map(|(name, count)| CategoryPayload {
                    name: name.clone(),
                    count: *count,
                    href: query
                        .with_category(CategoryFilter::parse(name))
                        .href(language),
                })
                .collect(),
            previous,
            next,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
struct EntryPayload {
    language: String,
    url: String,
    entry: EntryDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct SearchHitPayload {
    language: String,
    id: String,
    glyph: String,
    transliteration: String,
    meaning: String,
    category: String,
    score: Option<f64>,
    href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct SearchResponsePayload {
    query: String,
    mode: String,
    language: String,
    category: String,
    limit: usize,
    results: Vec<SearchHitPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct FavoritePayload {
    id: String,
    /// Absent when the id is in neither collection.
    language: Option<String>,
    glyph: Option<String>,
    transliteration: Option<String>,
    meaning: Option<String>,
    href: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct ReloadPayload {
    language: String,
    origin: String,
    generation: u64,
    entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SearchCacheKey {
    query: String,
    mode: SearchMode,
    languages: Vec<Language>,
    category: String,
    limit: usize,
    generations: Vec<u64>,
}

fn parse_language(value: &str) -> Result<Language, ApiError> {
    value
        .parse::<Language>()
        .map_err(|err| ApiError::not_found(err.to_string()))
}

async fn listing_view(
    state: &AppState,
    language: Language,
    query: &ListingQuery,
    favorites: &Favorites,
) -> ListingView {
    let collection = state.catalog.collection(language).await;
    ViewState::new(collection, state.page_size)
        .with_query(query.clone())
        .render(favorites)
}

async fn find_entry(
    state: &AppState,
    language: &str,
    id: &str,
) -> Result<(Language, Arc<Collection>), ApiError> {
    let language = parse_language(language)?;
    let collection = state.catalog.collection(language).await;
    if collection.get(id).is_none() {
        return Err(ApiError::not_found(format!(
            "No {language} entry with id {id:?}"
        )));
    }
    Ok((language, collection))
}

async fn run_search(
    state: &AppState,
    params: &SearchParams,
) -> Result<SearchResponsePayload, ApiError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter `q` is required"))?;
    let mode = params
        .mode
        .as_deref()
        .map(str::parse::<SearchMode>)
        .transpose()
        .map_err(ApiError::bad_request)?
        .unwrap_or_default();
    let scope = params.language.as_deref().unwrap_or("all");
    let languages = if scope.trim().eq_ignore_ascii_case("all") {
        Language::ALL.to_vec()
    } else {
        vec![
            scope
                .parse::<Language>()
                .map_err(|err| ApiError::bad_request(err.to_string()))?,
        ]
    };
    let category = params
        .category
        .as_deref()
        .map(CategoryFilter::parse)
        .unwrap_or_default();
    let limit = params.limit.unwrap_or(search::DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT);

    let mut collections = Vec::with_capacity(languages.len());
    for language in &languages {
        collections.push(state.catalog.collection(*language).await);
    }
    let key = SearchCacheKey {
        query: query.to_string(),
        mode,
        languages: languages.clone(),
        category: category.query_value().to_string(),
        limit,
        generations: collections.iter().map(|c| c.generation()).collect(),
    };
    if let Some(cached) = state.search_cache.lock().get(&key).cloned() {
        debug!(query, mode = mode.query_value(), "search cache hit");
        return Ok(cached);
    }

    let request = SearchRequest {
        query: query.to_string(),
        mode,
        category: category.clone(),
        limit,
    };
    let hits = search::search_many(collections.iter().map(|c| &**c), &request, &state.search);
    let payload = SearchResponsePayload {
        query: query.to_string(),
        mode: mode.query_value().to_string(),
        language: if languages.len() == 1 {
            languages[0].slug().to_string()
        } else {
            "all".to_string()
        },
        category: category.query_value().to_string(),
        limit,
        results: hits
            .iter()
            .map(|hit| SearchHitPayload {
                language: hit.language.slug().to_string(),
                id: hit.entry.id.clone(),
                glyph: hit.entry.glyph.clone(),
                transliteration: hit.entry.transliteration.clone(),
                meaning: hit.entry.meaning.clone(),
                category: hit.entry.category.clone(),
                score: hit.score,
                href: entry_path(hit.language, &hit.entry.id),
            })
            .collect(),
    };
    state.search_cache.lock().put(key, payload.clone());
    Ok(payload)
}

async fn resolve_favorites(state: &AppState, favorites: &Favorites) -> Vec<FavoritePayload> {
    let mut collections = Vec::new();
    for language in Language::ALL {
        collections.push(state.catalog.collection(language).await);
    }
    favorites
        .iter()
        .map(|id| {
            let found = collections
                .iter()
                .find_map(|c| c.get(id).map(|entry| (c.language(), entry)));
            match found {
                Some((language, entry)) => FavoritePayload {
                    id: id.to_string(),
                    language: Some(language.slug().to_string()),
                    glyph: Some(entry.glyph.clone()),
                    transliteration: Some(entry.transliteration.clone()),
                    meaning: Some(entry.meaning.clone()),
                    href: Some(entry_path(language, id)),
                },
                None => FavoritePayload {
                    id: id.to_string(),
                    language: None,
                    glyph: None,
                    transliteration: None,
                    meaning: None,
                    href: None,
                },
            }
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/api/words/{language}",
    params(("language" = String, Path, description = "`egyptian` or `sumerian`"), ListingParams),
    responses(
        (status = 200, description = "One listing page", body = ListingPayload),
        (status = 404, description = "Unknown language", body = ErrorPayload)
    ),
    tag = "lexicon"
)]
async fn api_words(
    State(state): State<SharedState>,
    Path(language): Path<String>,
    Query(params): Query<ListingParams>,
    headers: HeaderMap,
) -> Result<Json<ListingPayload>, ApiError> {
    let language = parse_language(&language)?;
    let query = params.to_query();
    let favorites = favorites_from_headers(&headers);
    let view = listing_view(&state, language, &query, &favorites).await;
    Ok(Json(ListingPayload::from_view(&view, &query, state.page_size)))
}

#[utoipa::path(
    get,
    path = "/api/words/{language}/{id}",
    params(
        ("language" = String, Path, description = "`egyptian` or `sumerian`"),
        ("id" = String, Path, description = "Entry identifier, e.g. `EG001`")
    ),
    responses(
        (status = 200, description = "Full entry", body = EntryPayload),
        (status = 404, description = "Unknown language or id", body = ErrorPayload)
    ),
    tag = "lexicon"
)]
async fn api_entry(
    State(state): State<SharedState>,
    Path((language, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<EntryPayload>, ApiError> {
    let (language, collection) = find_entry(&state, &language, &id).await?;
    let favorites = favorites_from_headers(&headers);
    let entry = collection
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("No {language} entry with id {id:?}")))?;
    Ok(Json(entry_payload(
        &state.base_url,
        language,
        entry,
        favorites.contains(&entry.id),
    )))
}

fn entry_payload(base_url: &str, language: Language, entry: &Entry, favorite: bool) -> EntryPayload {
    EntryPayload {
        language: language.slug().to_string(),
        url: format!("{base_url}{}", entry_path(language, &entry.id)),
        entry: EntryDetail::new(entry, favorite),
    }
}

#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching entries", body = SearchResponsePayload),
        (status = 400, description = "Missing query or bad parameter", body = ErrorPayload)
    ),
    tag = "lexicon"
)]
async fn api_search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponsePayload>, ApiError> {
    Ok(Json(run_search(&state, &params).await?))
}

#[utoipa::path(
    get,
    path = "/api/favorites",
    responses((status = 200, description = "Saved words from the `wordFavorites` cookie", body = [FavoritePayload])),
    tag = "lexicon"
)]
async fn api_favorites(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Json<Vec<FavoritePayload>> {
    let favorites = favorites_from_headers(&headers);
    Json(resolve_favorites(&state, &favorites).await)
}

#[utoipa::path(
    get,
    path = "/api/random",
    params(RandomParams),
    responses(
        (status = 200, description = "A random entry", body = EntryPayload),
        (status = 404, description = "Unknown language or empty collection", body = ErrorPayload)
    ),
    tag = "lexicon"
)]
async fn api_random(
    State(state): State<SharedState>,
    Query(params): Query<RandomParams>,
) -> Result<Json<EntryPayload>, ApiError> {
    let language = match params.language.as_deref() {
        Some(value) => parse_language(value)?,
        None => *Language::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Language::Egyptian),
    };
    let collection = state.catalog.collection(language).await;
    let entry = collection
        .entries()
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| ApiError::not_found(format!("The {language} collection is empty")))?;
    Ok(Json(entry_payload(&state.base_url, language, entry, false)))
}

#[utoipa::path(
    post,
    path = "/api/reload/{language}",
    params(("language" = String, Path, description = "`egyptian` or `sumerian`")),
    responses(
        (status = 200, description = "Collection reloaded from the data source", body = ReloadPayload),
        (status = 404, description = "Unknown language", body = ErrorPayload)
    ),
    tag = "lexicon"
)]
async fn api_reload(
    State(state): State<SharedState>,
    Path(language): Path<String>,
) -> Result<Json<ReloadPayload>, ApiError> {
    let language = parse_language(&language)?;
    let collection = state.catalog.refresh(language).await;
    info!(%language, generation = collection.generation(), origin = %collection.origin(), "collection reloaded");
    Ok(Json(ReloadPayload {
        language: language.slug().to_string(),
        origin: collection.origin().to_string(),
        generation: collection.generation(),
        entries: collection.len(),
    }))
}

async fn listing_html(
    State(state): State<SharedState>,
    Path(language): Path<String>,
    Query(params): Query<ListingParams>,
    headers: HeaderMap,
) -> Response {
    let language = match parse_language(&language) {
        Ok(language) => language,
        Err(err) => return error_response(state.theme, err),
    };
    let query = params.to_query();
    let favorites = favorites_from_headers(&headers);
    let view = listing_view(&state, language, &query, &favorites).await;
    let current_href = query.href(language);
    let cards = view
        .body
        .cards()
        .iter()
        .map(|card| CardView {
            href: entry_path(language, &card.id),
            toggle_action: toggle_action(language, &card.id, &current_href),
            card,
        })
        .collect();
    let all_count = view.categories.iter().map(|(_, count)| count).sum();
    let mut filters = vec![LinkView {
        label: "All".to_string(),
        href: query.with_category(CategoryFilter::All).href(language),
        active: query.category.is_all(),
        count: all_count,
    }];
    filters.extend(view.categories.iter().map(|(name, count)| {
        let filter = CategoryFilter::parse(name);
        LinkView {
            label: name.clone(),
            href: query.with_category(filter.clone()).href(language),
            active: query.category == filter,
            count: *count,
        }
    }));
    let sorts = SortKey::ALL
        .iter()
        .map(|key| SortOption {
            value: key.query_value(),
            label: match key {
                SortKey::Glyph => language.glyph_label(),
                SortKey::Classification => language.classification_label(),
                other => other.label(),
            },
            selected: *key == query.sort,
        })
        .collect();
    let pages = page_links(language, &query, &view);
    let json_ld = term_set_json_ld(&state.base_url, language, view.body.cards());
    let template = ListingTemplate {
        chrome: Chrome::new(state.theme),
        language,
        view: &view,
        cards,
        filters,
        sorts,
        pages,
        category_value: if query.category.is_all() {
            String::new()
        } else {
            query.category.query_value().to_string()
        },
        no_results: NO_RESULTS_MESSAGE,
        canonical_url: format!("{}{}", state.base_url, current_href),
        json_ld,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(state.theme, err.to_string())),
    )
    .into_response()
}

async fn entry_html(
    State(state): State<SharedState>,
    Path((language, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let (language, collection) = match find_entry(&state, &language, &id).await {
        Ok(found) => found,
        Err(err) => return error_response(state.theme, err),
    };
    let Some(entry) = collection.get(&id) else {
        return error_response(
            state.theme,
            ApiError::not_found(format!("No {language} entry with id {id:?}")),
        );
    };
    let favorites = favorites_from_headers(&headers);
    let detail = EntryDetail::new(entry, favorites.contains(&entry.id));
    let path = entry_path(language, &entry.id);
    let json_ld = entry_json_ld(&state.base_url, language, entry);
    let template = EntryTemplate {
        chrome: Chrome::new(state.theme),
        language,
        notes_html: render_markdown(detail.notes.as_deref()),
        etymology_html: render_markdown(detail.etymology.as_deref()),
        toggle_action: toggle_action(language, &entry.id, &path),
        canonical_url: format!("{}{}", state.base_url, path),
        detail: &detail,
        json_ld,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(state.theme, err.to_string())),
    )
    .into_response()
}

async fn search_html(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let has_query = params.q.as_deref().is_some_and(|q| !q.trim().is_empty());
    let payload = if has_query {
        match run_search(&state, &params).await {
            Ok(payload) => Some(payload),
            Err(err) => return error_response(state.theme, err),
        }
    } else {
        None
    };
    let rows = payload
        .as_ref()
        .map(|payload| {
            payload
                .results
                .iter()
                .map(|hit| HitRow {
                    score_label: hit
                        .score
                        .map(|score| format!("{score:.2}"))
                        .unwrap_or_else(|| "—".to_string()),
                    hit,
                })
                .collect()
        })
        .unwrap_or_default();
    let mode = payload
        .as_ref()
        .map(|payload| payload.mode.clone())
        .unwrap_or_else(|| SearchMode::default().query_value().to_string());
    let template = SearchTemplate {
        chrome: Chrome::new(state.theme),
        query: params.q.clone().unwrap_or_default(),
        searched: payload.is_some(),
        rows,
        no_results: NO_RESULTS_MESSAGE,
        modes: SelectOption::list(
            [SearchMode::Fuzzy, SearchMode::Prefix, SearchMode::Substring].map(SearchMode::query_value),
            &mode,
        ),
        mode,
        languages: SelectOption::list(
            Language::ALL.iter().map(|language| language.slug()),
            params.language.as_deref().unwrap_or("all"),
        ),
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(state.theme, err.to_string())),
    )
    .into_response()
}

async fn favorites_html(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let favorites = favorites_from_headers(&headers);
    let rows = resolve_favorites(&state, &favorites).await;
    let actions = rows
        .iter()
        .map(|row| match (&row.language, &row.href) {
            (Some(language), Some(_)) => language
                .parse::<Language>()
                .map(|language| toggle_action(language, &row.id, "/favorites"))
                .unwrap_or_default(),
            _ => String::new(),
        })
        .collect();
    let template = FavoritesTemplate {
        chrome: Chrome::new(state.theme),
        rows: &rows,
        actions,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(state.theme, err.to_string())),
    )
    .into_response()
}

async fn toggle_favorite(
    State(state): State<SharedState>,
    Path((language, id)): Path<(String, String)>,
    Query(params): Query<ToggleParams>,
    headers: HeaderMap,
) -> Response {
    let language = match find_entry(&state, &language, &id).await {
        Ok((language, _)) => language,
        Err(err) => return error_response(state.theme, err),
    };
    let mut favorites = favorites_from_headers(&headers);
    let saved = favorites.toggle(&id);
    let cookie = match favorites_cookie(&favorites) {
        Ok(cookie) => cookie,
        Err(err) => {
            warn!(%language, %id, count = favorites.len(), "favorites cookie is full");
            return error_response(state.theme, err);
        }
    };
    debug!(%language, %id, saved, "favorite toggled");
    let target = params
        .return_to
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| entry_path(language, &id));
    (
        [(header::SET_COOKIE, cookie)],
        Redirect::to(&target),
    )
        .into_response()
}

async fn asset(Path(path): Path<String>) -> Response {
    match ASSETS.get_file(&path) {
        Some(file) => {
            let content_type = match path.rsplit('.').next() {
                Some("css") => mime::TEXT_CSS_UTF_8,
                Some("js") => mime::APPLICATION_JAVASCRIPT_UTF_8,
                Some("svg") => mime::IMAGE_SVG,
                _ => mime::APPLICATION_OCTET_STREAM,
            };
            (
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                file.contents(),
            )
                .into_response()
        }
        None => ApiError::not_found(format!("No asset named {path:?}")).into_response(),
    }
}

async fn sitemap_xml(State(state): State<SharedState>) -> impl IntoResponse {
    let mut body = String::with_capacity(4096);
    body.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    body.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
    let mut push_url = |loc: String, priority: &str| {
        body.push_str("<url><loc>");
        body.push_str(&xml_escape(&loc));
        body.push_str("</loc><changefreq>weekly</changefreq><priority>");
        body.push_str(priority);
        body.push_str("</priority></url>");
    };
    push_url(state.base_url.clone(), "0.8");
    for language in Language::ALL {
        let collection = state.catalog.collection(language).await;
        push_url(format!("{}/words/{}", state.base_url, language.slug()), "0.7");
        for entry in collection.entries() {
            push_url(
                format!("{}{}", state.base_url, entry_path(language, &entry.id)),
                "0.5",
            );
        }
    }
    body.push_str("</urlset>");
    ([(header::CONTENT_TYPE, "application/xml")], body)
}

/// Reads the `wordFavorites` cookie.
fn favorites_from_headers(headers: &HeaderMap) -> Favorites {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse(raw).flatten() {
            if cookie.name() == FAVORITES_COOKIE {
                return Favorites::from_cookie_value(cookie.value());
            }
        }
    }
    Favorites::default()
}

fn favorites_cookie(favorites: &Favorites) -> Result<String, ApiError> {
    let value = favorites.to_cookie_value();
    if value.len() > MAX_FAVORITES_COOKIE_BYTES {
        return Err(ApiError::too_large(format!(
            "{} favorites no longer fit in a browser cookie; remove some first",
            favorites.len()
        )));
    }
    Ok(Cookie::build((FAVORITES_COOKIE, value))
        .path("/")
        .same_site(SameSite::Lax)
        .permanent()
        .build()
        .to_string())
}

fn error_response(theme: WebTheme, err: ApiError) -> Response {
    (err.status, Html(render_error_page(theme, err.message))).into_response()
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    let chrome = Chrome::new(theme);
    let message = xml_escape(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Ancient Lexicon • Error</title>
    {head}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class} space-y-4">
        <p class="{eyebrow_class}">Something went wrong</p>
        <h1 class="{headline_class}">Unable to load page</h1>
        <p class="{lede_class}">{message}</p>
        <div class="{cta_group}">
          <a href="/" class="{button_class}">Back to home</a>
          <a href="/search" class="{button_class}">Search</a>
        </div>
      </div>
    </main>
  </body>
</html>"#,
        head = chrome.head,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        eyebrow_class = chrome.eyebrow_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        cta_group = chrome.cta_group_class,
        button_class = chrome.button_class,
    )
}

fn page_links(language: Language, query: &ListingQuery, view: &ListingView) -> Vec<PageLink> {
    view.controls
        .items
        .iter()
        .map(|item| match item {
            PaginationItem::Previous { page } => PageLink {
                label: "‹ Previous".to_string(),
                href: query.with_page(*page).href(language),
                current: false,
                ellipsis: false,
            },
            PaginationItem::Page { page, current } => PageLink {
                label: page.to_string(),
                href: query.with_page(*page).href(language),
                current: *current,
                ellipsis: false,
            },
            PaginationItem::Ellipsis => PageLink {
                label: "…".to_string(),
                href: String::new(),
                current: false,
                ellipsis: true,
            },
            PaginationItem::Next { page } => PageLink {
                label: "Next ›".to_string(),
                href: query.with_page(*page).href(language),
                current: false,
                ellipsis: false,
            },
        })
        .collect()
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn entry_path(language: Language, id: &str) -> String {
    format!("/words/{}/{}", language.slug(), encode_component(id))
}

fn toggle_action(language: Language, id: &str, return_to: &str) -> String {
    format!(
        "/favorites/{}/{}?return_to={}",
        language.slug(),
        encode_component(id),
        encode_component(return_to)
    )
}

fn term_set_json_ld(base_url: &str, language: Language, cards: &[EntryCard]) -> String {
    let set_url = format!("{}/words/{}", base_url, language.slug());
    let terms = cards
        .iter()
        .map(|card| {
            json!({
                "@type": "DefinedTerm",
                "name": card.transliteration,
                "description": card.meaning,
                "termCode": card.id,
                "url": format!("{}{}", base_url, entry_path(language, &card.id)),
            })
        })
        .collect::<Vec<_>>();
    script_json(&json!({
        "@context": "https://schema.org",
        "@type": "DefinedTermSet",
        "@id": set_url,
        "name": format!("{} lexicon", language.display_name()),
        "url": set_url,
        "hasDefinedTerm": terms,
    }))
}

fn entry_json_ld(base_url: &str, language: Language, entry: &Entry) -> String {
    let set_url = format!("{}/words/{}", base_url, language.slug());
    let entry_url = format!("{}{}", base_url, entry_path(language, &entry.id));
    let mut term = json!({
        "@type": "DefinedTerm",
        "@id": entry_url,
        "url": entry_url,
        "name": entry.transliteration,
        "alternateName": entry.glyph,
        "description": entry.meaning,
        "termCode": entry.id,
        "inDefinedTermSet": set_url,
    });
    if let Some(code) = &entry.classification {
        term["identifier"] = json!(code);
    }
    let breadcrumb = json!({
        "@type": "BreadcrumbList",
        "itemListElement": [
            { "@type": "ListItem", "position": 1, "name": "Home", "item": base_url },
            { "@type": "ListItem", "position": 2, "name": language.display_name(), "item": set_url },
            { "@type": "ListItem", "position": 3, "name": entry.transliteration, "item": entry_url }
        ]
    });
    script_json(&json!({
        "@context": "https://schema.org",
        "@graph": [term, breadcrumb]
    }))
}

fn website_json_ld(base_url: &str) -> String {
    script_json(&json!({
        "@context": "https://schema.org",
        "@type": "WebSite",
        "url": base_url,
        "potentialAction": {
            "@type": "SearchAction",
            "target": format!("{}/search?q={{search_term_string}}&mode=fuzzy", base_url),
            "query-input": "required name=search_term_string"
        }
    }))
}

/// Pretty JSON that is safe inside a `<script>` element. `<`, `>` and `&`
/// become unicode escapes, so no string value can close the element.
fn script_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

fn indent_json(content: &str, spaces: usize) -> String {
    let padding = " ".repeat(spaces);
    content
        .lines()
        .map(|line| format!("{padding}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn markdown_options() -> MarkdownOptions {
    // Collections may come from a remote source; raw HTML stays escaped.
    MarkdownOptions::gfm()
}

fn render_markdown(input: Option<&str>) -> Option<String> {
    let trimmed = input?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let html = to_html_with_options(trimmed, &markdown_options())
        .unwrap_or_else(|_| xml_escape(trimmed));
    Some(html)
}

struct CardView<'a> {
    card: &'a EntryCard,
    href: String,
    toggle_action: String,
}

struct LinkView {
    label: String,
    href: String,
    active: bool,
    count: usize,
}

struct SortOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

struct PageLink {
    label: String,
    href: String,
    current: bool,
    ellipsis: bool,
}

struct HitRow<'a> {
    hit: &'a SearchHitPayload,
    score_label: String,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Ancient Lexicon • {{ language.display_name() }}</title>
    {{ chrome.head|safe }}
    <link rel="canonical" href="{{ canonical_url }}">
    <script type="application/ld+json">
    {{ json_ld|safe }}
    </script>
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }} space-y-6">
        <div>
          <p class="{{ chrome.eyebrow_class }}"><a href="/">Ancient Lexicon</a> • {{ view.origin }} data</p>
          <h1 class="{{ chrome.headline_class }}">{{ language.display_name() }} words</h1>
          <p class="{{ chrome.lede_class }}" id="page-info">{{ view.info.text }}</p>
        </div>

        <nav class="flex flex-wrap gap-2 d-flex" id="category-filters" aria-label="Categories">
          {% for filter in filters %}
          <a href="{{ filter.href }}" class="{% if filter.active %}{{ chrome.pill_active_class }}{% else %}{{ chrome.pill_class }}{% endif %}" data-category="{{ filter.label }}">{{ filter.label }} ({{ filter.count }})</a>
          {% endfor %}
        </nav>

        <form method="get" action="/words/{{ language.slug() }}" class="flex gap-2 d-flex align-items-center">
          {% if !category_value.is_empty() %}
          <input type="hidden" name="category" value="{{ category_value }}">
          {% endif %}
          <label for="sort-select">Sort by</label>
          <select id="sort-select" name="sort" class="form-select w-auto border rounded px-2 py-1">
            {% for option in sorts %}
            <option value="{{ option.value }}"{% if option.selected %} selected{% endif %}>{{ option.label }}</option>
            {% endfor %}
          </select>
          <button type="submit" class="{{ chrome.pill_class }}">Apply</button>
        </form>

        <section id="word-list" class="grid gap-4 md:grid-cols-2 row row-cols-1 row-cols-md-2 g-3">
          {% if cards.len() == 0 %}
          <p class="no-results">{{ no_results }}</p>
          {% else %}
          {% for item in cards %}
          <article class="{{ chrome.entry_card_class }} col" id="word-{{ item.card.id }}">
            <div class="flex justify-between d-flex justify-content-between">
              <a href="{{ item.href }}" class="{{ chrome.glyph_class }}" title="{{ language.glyph_label() }}">{{ item.card.glyph }}</a>
              <form method="post" action="{{ item.toggle_action }}">
                <button type="submit" class="favorite-toggle" aria-pressed="{{ item.card.favorite }}">{% if item.card.favorite %}★{% else %}☆{% endif %}</button>
              </form>
            </div>
            <p class="text-xl font-semibold"><a href="{{ item.href }}">{{ item.card.transliteration }}</a></p>
            <p>{{ item.card.meaning }}</p>
            <p class="text-sm text-stone-500">
              <span class="category-tag">{{ item.card.category }}</span>
              {% if !item.card.period.is_empty() %} • {{ item.card.period }}{% endif %}
              {% if !item.card.classification.is_empty() %} • {{ language.classification_label() }} {{ item.card.classification }}{% endif %}
            </p>
          </article>
          {% endfor %}
          {% endif %}
        </section>

        <nav id="pagination" aria-label="Pages" class="space-y-2">
          <ul class="flex flex-wrap gap-2 pagination">
            {% for link in pages %}
            {% if link.ellipsis %}
            <li class="page-item disabled"><span class="page-link px-2">{{ link.label }}</span></li>
            {% else if link.current %}
            <li class="page-item active"><span class="page-link {{ chrome.pill_active_class }}" aria-current="page">{{ link.label }}</span></li>
            {% else %}
            <li class="page-item"><a href="{{ link.href }}" class="page-link {{ chrome.pill_class }}">{{ link.label }}</a></li>
            {% endif %}
            {% endfor %}
          </ul>
          <p class="text-sm text-stone-500">{{ view.controls.summary }}</p>
        </nav>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct ListingTemplate<'a> {
    chrome: Chrome,
    language: Language,
    view: &'a ListingView,
    cards: Vec<CardView<'a>>,
    filters: Vec<LinkView>,
    sorts: Vec<SortOption>,
    pages: Vec<PageLink>,
    category_value: String,
    no_results: &'static str,
    canonical_url: String,
    json_ld: String,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Ancient Lexicon • {{ detail.transliteration }}</title>
    {{ chrome.head|safe }}
    <link rel="canonical" href="{{ canonical_url }}">
    <script type="application/ld+json">
    {{ json_ld|safe }}
    </script>
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }} space-y-6">
        <div>
          <p class="{{ chrome.eyebrow_class }}"><a href="/words/{{ language.slug() }}">{{ language.display_name() }}</a> • {{ detail.id }}</p>
          <p class="{{ chrome.glyph_class }}">{{ detail.glyph }}</p>
          <h1 class="{{ chrome.headline_class }}">{{ detail.transliteration }}</h1>
          <p class="{{ chrome.lede_class }}">{{ detail.meaning }}</p>
          <form method="post" action="{{ toggle_action }}">
            <button type="submit" class="{{ chrome.button_class }}">{% if detail.favorite %}★ Remove from favorites{% else %}☆ Add to favorites{% endif %}</button>
          </form>
        </div>

        <section id="overview" class="{{ chrome.entry_card_class }}">
          <dl class="grid gap-2 md:grid-cols-2">
            <dt class="font-semibold">Category</dt><dd>{{ detail.category }}</dd>
            {% if !detail.periods.is_empty() %}
            <dt class="font-semibold">Periods</dt><dd>{{ detail.periods }}</dd>
            {% endif %}
            {% if let Some(classification) = detail.classification %}
            <dt class="font-semibold">{{ language.classification_label() }}</dt><dd>{{ classification }}</dd>
            {% endif %}
            {% if let Some(pronunciation) = detail.pronunciation %}
            <dt class="font-semibold">Pronunciation</dt><dd>{{ pronunciation }}</dd>
            {% endif %}
          </dl>
        </section>

        {% if detail.usage.len() > 0 %}
        <section id="usage">
          <h2 class="text-xl font-semibold mb-2">Usage</h2>
          <ul class="list-disc pl-6 space-y-1">
            {% for example in detail.usage %}
            <li>{{ example }}</li>
            {% endfor %}
          </ul>
        </section>
        {% endif %}

        {% if let Some(notes) = notes_html %}
        <section id="notes">
          <h2 class="text-xl font-semibold mb-2">Notes</h2>
          <div class="bg-white shadow rounded p-4 prose max-w-none">{{ notes|safe }}</div>
        </section>
        {% endif %}

        {% if let Some(etymology) = etymology_html %}
        <section id="etymology">
          <h2 class="text-xl font-semibold mb-2">Etymology</h2>
          <div class="bg-white shadow rounded p-4 prose max-w-none">{{ etymology|safe }}</div>
        </section>
        {% endif %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct EntryTemplate<'a> {
    chrome: Chrome,
    language: Language,
    detail: &'a EntryDetail,
    notes_html: Option<String>,
    etymology_html: Option<String>,
    toggle_action: String,
    canonical_url: String,
    json_ld: String,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Ancient Lexicon • Search</title>
    {{ chrome.head|safe }}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }} space-y-4">
        <div>
          <p class="{{ chrome.eyebrow_class }}"><a href="/">Ancient Lexicon</a> • Mode: {{ mode }}</p>
          <h1 class="{{ chrome.headline_class }}">{% if searched %}Search results for “{{ query }}”{% else %}Search{% endif %}</h1>
        </div>
        <form method="get" action="/search" class="flex flex-wrap gap-2 d-flex">
          <input type="search" name="q" value="{{ query }}" class="form-control border rounded px-2 py-1" placeholder="ankh, water, lugal…">
          <select name="mode" class="form-select w-auto border rounded px-2 py-1">
            {% for option in modes %}
            <option value="{{ option.value }}"{% if option.selected %} selected{% endif %}>{{ option.value }}</option>
            {% endfor %}
          </select>
          <select name="language" class="form-select w-auto border rounded px-2 py-1">
            <option value="all">all languages</option>
            {% for option in languages %}
            <option value="{{ option.value }}"{% if option.selected %} selected{% endif %}>{{ option.value }}</option>
            {% endfor %}
          </select>
          <button type="submit" class="{{ chrome.button_class }}">Search</button>
        </form>
        {% if searched %}
        {% if rows.len() == 0 %}
          <p class="no-results">{{ no_results }}</p>
        {% else %}
        <p class="{{ chrome.lede_class }}">{{ rows.len() }} matches.</p>
        <div class="bg-white shadow rounded overflow-hidden">
          <table class="min-w-full table">
            <thead class="bg-stone-100 text-left">
              <tr>
                <th class="px-4 py-2">Glyph</th>
                <th class="px-4 py-2">Word</th>
                <th class="px-4 py-2">Meaning</th>
                <th class="px-4 py-2">Language</th>
                <th class="px-4 py-2">Score</th>
              </tr>
            </thead>
            <tbody>
              {% for row in rows %}
              <tr class="border-b border-stone-200">
                <td class="px-4 py-2 lexicon-glyph">{{ row.hit.glyph }}</td>
                <td class="px-4 py-2"><a href="{{ row.hit.href }}" class="text-blue-700 hover:underline">{{ row.hit.transliteration }}</a></td>
                <td class="px-4 py-2">{{ row.hit.meaning }}</td>
                <td class="px-4 py-2">{{ row.hit.language }}</td>
                <td class="px-4 py-2">{{ row.score_label }}</td>
              </tr>
              {% endfor %}
            </tbody>
          </table>
        </div>
        {% endif %}
        {% endif %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct SearchTemplate<'a> {
    chrome: Chrome,
    query: String,
    mode: String,
    searched: bool,
    rows: Vec<HitRow<'a>>,
    no_results: &'static str,
    modes: Vec<SelectOption>,
    languages: Vec<SelectOption>,
}

struct SelectOption {
    value: &'static str,
    selected: bool,
}

impl SelectOption {
    fn list(values: impl IntoIterator<Item = &'static str>, selected: &str) -> Vec<Self> {
        values
            .into_iter()
            .map(|value| Self {
                value,
                selected: value == selected,
            })
            .collect()
    }
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Ancient Lexicon • Favorites</title>
    {{ chrome.head|safe }}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }} space-y-4">
        <div>
          <p class="{{ chrome.eyebrow_class }}"><a href="/">Ancient Lexicon</a></p>
          <h1 class="{{ chrome.headline_class }}">Favorites</h1>
          <p class="{{ chrome.lede_class }}">{{ rows.len() }} saved word{% if rows.len() != 1 %}s{% endif %}.</p>
        </div>
        {% if rows.len() == 0 %}
        <p class="no-results">No favorites yet. Use ☆ on any word to save it.</p>
        {% else %}
        <ul class="space-y-2 list-unstyled">
          {% for row in rows %}
          <li class="{{ chrome.entry_card_class }}">
            {% if let Some(href) = row.href %}
            <a href="{{ href }}"><span class="lexicon-glyph">{{ row.glyph.as_deref().unwrap_or("") }}</span> <strong>{{ row.transliteration.as_deref().unwrap_or("") }}</strong></a>
            <span>{{ row.meaning.as_deref().unwrap_or("") }}</span>
            <form method="post" action="{{ actions[loop.index0] }}" class="inline">
              <button type="submit" class="favorite-toggle">Remove</button>
            </form>
            {% else %}
            <span>{{ row.id }} (no longer available)</span>
            {% endif %}
          </li>
          {% endfor %}
        </ul>
        {% endif %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct FavoritesTemplate<'a> {
    chrome: Chrome,
    rows: &'a [FavoritePayload],
    actions: Vec<String>,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use crate::source::DataSource;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    fn test_state(page_size: usize) -> SharedState {
        let lexicon = LexiconConfig {
            source: DataSource::Bundled,
            page_size,
            ..LexiconConfig::default()
        };
        Arc::new(AppState::new(
            lexicon,
            WebTheme::Tailwind,
            "http://127.0.0.1:8080",
        ))
    }

    fn test_router() -> Router {
        build_router(test_state(20), true)
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn ld_json(html: &str) -> serde_json::Value {
        let open = r#"<script type="application/ld+json">"#;
        let start = html.find(open).unwrap() + open.len();
        let end = start + html[start..].find("</script>").unwrap();
        serde_json::from_str(&html[start..end]).unwrap()
    }

    #[tokio::test]
    async fn api_words_lists_first_page() {
        let (status, text) = get_body(test_router(), "/api/words/egyptian").await;
        assert!(status.is_success());
        let payload: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(payload["entries"].as_array().unwrap().len(), 12);
        assert_eq!(payload["total_pages"], 1);
        assert_eq!(payload["origin"], "bundled");
        assert!(payload["previous"].is_null());
    }

    #[tokio::test]
    async fn api_words_filters_and_sorts() {
        let (status, text) =
            get_body(test_router(), "/api/words/sumerian?category=nature&sort=meaning").await;
        assert!(status.is_success());
        let payload: serde_json::Value = serde_json::from_str(&text).unwrap();
        let ids: Vec<&str> = payload["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["SU007", "SU002", "SU009", "SU006"]);
        assert_eq!(payload["category"], "nature");
    }

    #[tokio::test]
    async fn api_words_past_last_page_is_empty() {
        let (status, text) = get_body(test_router(), "/api/words/egyptian?page=5").await;
        assert!(status.is_success());
        let payload: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(payload["entries"].as_array().unwrap().is_empty());
        assert_eq!(payload["total_pages"], 1);
        assert_eq!(payload["info"], "Showing 0 of 12 words");
    }

    #[tokio::test]
    async fn unknown_entry_is_not_found() {
        let (status, text) = get_body(test_router(), "/api/words/egyptian/EG999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(text.contains("EG999"));
        let (status, _) = get_body(test_router(), "/api/words/latin").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn api_entry_returns_detail() {
        let (status, text) = get_body(test_router(), "/api/words/egyptian/EG001").await;
        assert!(status.is_success());
        let payload: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(payload["entry"]["transliteration"], "ꜥnḫ");
        assert_eq!(payload["entry"]["periods"], "OK, MK, NK, LP");
        assert_eq!(payload["url"], "http://127.0.0.1:8080/words/egyptian/EG001");
    }

    #[tokio::test]
    async fn api_search_finds_water_in_both_languages() {
        let (status, text) = get_body(test_router(), "/api/search?q=water&limit=5").await;
        assert!(status.is_success());
        let payload: SearchResponsePayload = serde_json::from_str(&text).unwrap();
        let ids: Vec<&str> = payload.results.iter().map(|hit| hit.id.as_str()).collect();
        assert!(ids.contains(&"EG009"));
        assert!(ids.contains(&"SU006"));
        assert_eq!(payload.language, "all");
    }

    #[tokio::test]
    async fn api_search_requires_query() {
        let (status, _) = get_body(test_router(), "/api/search?q=%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get_body(test_router(), "/api/search?q=an&mode=regex").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn repeated_search_is_served_from_cache() {
        let state = test_state(20);
        let params = SearchParams {
            q: Some("lugal".into()),
            mode: Some("prefix".into()),
            language: Some("sumerian".into()),
            category: None,
            limit: None,
        };
        let first = run_search(&state, &params).await.unwrap();
        assert_eq!(state.search_cache.lock().len(), 1);
        let second = run_search(&state, &params).await.unwrap();
        assert_eq!(first.results.len(), 1);
        assert_eq!(second.results[0].id, "SU004");
        assert_eq!(state.search_cache.lock().len(), 1);
    }

    #[tokio::test]
    async fn listing_page_renders_pagination() {
        let router = build_router(test_state(5), false);
        let (status, html) = get_body(router, "/words/egyptian?page=2").await;
        assert!(status.is_success());
        assert!(html.contains("Page 2 of 3 (5 words per page)"));
        assert!(html.contains("Showing 6-10 of 12 words"));
        assert!(html.contains(r#"href="/words/egyptian?page=3""#));
        let structured = ld_json(&html);
        assert_eq!(structured["@type"], "DefinedTermSet");
        assert_eq!(structured["hasDefinedTerm"].as_array().unwrap().len(), 5);
        assert!(!html.contains("&quot;@context"));
    }

    #[tokio::test]
    async fn empty_category_renders_placeholder() {
        let (status, html) = get_body(test_router(), "/words/sumerian?category=music").await;
        assert!(status.is_success());
        assert!(html.contains(NO_RESULTS_MESSAGE));
        assert!(html.contains("Page 1 of 0"));
    }

    #[tokio::test]
    async fn entry_page_renders_markdown_notes() {
        let (status, html) = get_body(test_router(), "/words/egyptian/EG001").await;
        assert!(status.is_success());
        assert!(html.contains("<section id=\"notes\">"));
        assert!(html.contains("Gardiner"));
        let structured = ld_json(&html);
        assert_eq!(structured["@graph"][0]["termCode"], "EG001");
        assert_eq!(structured["@graph"][0]["identifier"], "S34");
    }

    #[test]
    fn script_json_cannot_close_the_script_element() {
        let encoded = script_json(&json!({ "description": "</script><b>&</b>" }));
        assert!(!encoded.contains('<'));
        assert!(!encoded.contains('&'));
        let decoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded["description"], "</script><b>&</b>");
    }

    #[tokio::test]
    async fn toggle_sets_cookie_and_redirects() {
        let response = test_router()
            .oneshot(
                Request::post("/favorites/sumerian/SU004?return_to=%2Fwords%2Fsumerian")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/words/sumerian"
        );
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("wordFavorites=SU004;"));
    }

    #[tokio::test]
    async fn full_favorites_cookie_refuses_another_id() {
        let held: Favorites = (1..=650).map(|n| format!("EG{n:03}")).collect();
        assert!(held.to_cookie_value().len() <= MAX_FAVORITES_COOKIE_BYTES);
        let response = test_router()
            .oneshot(
                Request::post("/favorites/egyptian/EG001")
                    .header(header::COOKIE, format!("wordFavorites={}", held.to_cookie_value()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());

        let response = test_router()
            .oneshot(
                Request::post("/favorites/sumerian/SU004")
                    .header(header::COOKIE, format!("wordFavorites={}", held.to_cookie_value()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn favorites_are_read_from_cookie() {
        let response = test_router()
            .oneshot(
                Request::get("/api/favorites")
                    .header(header::COOKIE, "theme=dark; wordFavorites=%5B%22EG002%22%2C%22XX1%22%5D")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: Vec<FavoritePayload> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].language.as_deref(), Some("egyptian"));
        assert!(payload[1].language.is_none());
    }

    #[tokio::test]
    async fn reload_bumps_generation() {
        let state = test_state(20);
        let router = build_router(state.clone(), false);
        let response = router
            .oneshot(
                Request::post("/api/reload/egyptian")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: ReloadPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.generation, 1);
        assert_eq!(payload.entries, 12);
        assert_eq!(state.catalog.refresh(Language::Egyptian).await.generation(), 2);
    }

    #[tokio::test]
    async fn random_entry_belongs_to_language() {
        let (status, text) = get_body(test_router(), "/api/random?language=sumerian").await;
        assert!(status.is_success());
        let payload: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(payload["language"], "sumerian");
        assert!(payload["entry"]["id"].as_str().unwrap().starts_with("SU"));
    }

    #[tokio::test]
    async fn sitemap_lists_entries() {
        let (status, text) = get_body(test_router(), "/sitemap.xml").await;
        assert!(status.is_success());
        assert!(text.contains("<urlset"));
        assert!(text.contains("http://127.0.0.1:8080/words/sumerian/SU001"));
    }

    #[tokio::test]
    async fn openapi_document_lists_paths() {
        let (status, text) = get_body(test_router(), "/api/openapi.json").await;
        assert!(status.is_success());
        assert!(text.contains("/api/words/{language}"));
        let (status, _) = get_body(build_router(test_state(20), false), "/api/openapi.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stylesheet_is_served() {
        let response = test_router()
            .oneshot(
                Request::get("/assets/lexicon.css")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/css; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn home_and_health_render() {
        let (status, html) = get_body(test_router(), "/").await;
        assert!(status.is_success());
        assert!(html.contains("Word of the day"));
        let (status, text) = get_body(test_router(), "/healthz").await;
        assert!(status.is_success());
        assert!(text.contains("ok"));
    }

    #[test]
    fn render_markdown_escapes_raw_html() {
        let html = render_markdown(Some("*sign* <script>x</script>")).unwrap();
        assert!(html.contains("<em>sign</em>"));
        assert!(!html.contains("<script>"));
        assert!(render_markdown(Some("  ")).is_none());
    }

    #[test]
    fn malformed_cookie_reads_as_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "wordFavorites=%5Bnot-json".parse().unwrap());
        assert!(favorites_from_headers(&headers).is_empty());
        headers.insert(header::COOKIE, "wordFavorites=,,".parse().unwrap());
        assert!(favorites_from_headers(&headers).is_empty());
    }
}

use std::error::Error;
#[cfg(feature = "web")]
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use ancient_lexicon::catalog::Catalog;
use ancient_lexicon::config::LexiconConfig;
use ancient_lexicon::favorites::FavoritesFile;
use ancient_lexicon::listing::{self, CategoryFilter, SortKey};
use ancient_lexicon::render::{
    EntryDetail, ListingBody, NO_RESULTS_MESSAGE, PaginationControls, PaginationItem,
};
use ancient_lexicon::search::{self, SearchMode, SearchRequest};
use ancient_lexicon::source::{Collection, DataSource, EntryLoader};
use ancient_lexicon::view::{ListingView, ViewAction, ViewState};
use ancient_lexicon::{Entry, Language, day_number, entry_of_the_day};
use atty::Stream;
use clap::{Parser, Subcommand};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "LEXICON_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "ancient-lexicon",
    about = "Browse Egyptian and Sumerian lexicon entries",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Base URL serving `egyptian.json` and `sumerian.json`.
    #[arg(long, global = true, value_name = "URL")]
    source_url: Option<String>,

    /// Directory holding `egyptian.json` and `sumerian.json`.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Only use the collections compiled into the binary.
    #[arg(long, global = true)]
    bundled: bool,

    /// Favorites file (JSON array of entry ids).
    #[arg(long, global = true, value_name = "PATH")]
    favorites: Option<PathBuf>,

    /// Words per listing page.
    #[arg(long, global = true)]
    page_size: Option<usize>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one page of a language's words.
    List {
        language: Language,
        /// 1-based page number.
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Exact category name, or `all`.
        #[arg(short, long)]
        category: Option<String>,
        /// glyph, transliteration, meaning or classification.
        #[arg(short, long)]
        sort: Option<SortKey>,
    },
    /// Show every field of one entry.
    Show { language: Language, id: String },
    /// Search transliterations and meanings.
    Search {
        query: String,
        /// `egyptian`, `sumerian` or `all`.
        #[arg(short, long, default_value = "all")]
        language: String,
        /// fuzzy, prefix or substring.
        #[arg(short, long, default_value = "fuzzy")]
        mode: SearchMode,
        #[arg(short, long)]
        category: Option<String>,
        /// Maximum number of matches to return.
        #[arg(short = 'n', long, default_value_t = search::DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    /// List a language's categories with their word counts.
    Categories { language: Language },
    /// Show today's featured word.
    Today { language: Option<Language> },
    /// Manage saved words.
    #[command(subcommand)]
    Favorites(FavoritesCommand),
    /// Run the HTTP service.
    #[cfg(feature = "web")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
        /// Public URL used in links, sitemap and JSON-LD.
        #[arg(long)]
        base_url: Option<String>,
        /// tailwind or bootstrap.
        #[arg(long, default_value = "tailwind")]
        theme: String,
        #[arg(long)]
        no_openapi: bool,
    },
}

#[derive(Subcommand, Debug)]
enum FavoritesCommand {
    /// Print saved words.
    List,
    /// Save a word, or forget it if already saved.
    Toggle { language: Language, id: String },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.config()?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(cli, config))
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

impl Cli {
    fn config(&self) -> Result<LexiconConfig, Box<dyn Error>> {
        let mut config = LexiconConfig::from_env()?;
        if self.bundled {
            config.source = DataSource::Bundled;
        } else if let Some(url) = &self.source_url {
            config.source = DataSource::Remote {
                base_url: url.clone(),
            };
        } else if let Some(dir) = &self.data_dir {
            config.source = DataSource::Directory(dir.clone());
        }
        if let Some(path) = &self.favorites {
            config.favorites_path = path.clone();
        }
        if let Some(size) = self.page_size {
            if size == 0 {
                return Err("--page-size must be at least 1".into());
            }
            config.page_size = size;
        }
        Ok(config)
    }
}

async fn dispatch(cli: Cli, config: LexiconConfig) -> Result<(), Box<dyn Error>> {
    let catalog = Catalog::new(EntryLoader::new(config.source.clone()));
    let as_json = cli.json;
    match cli.command {
        Command::List {
            language,
            page,
            category,
            sort,
        } => {
            let favorites = FavoritesFile::open(&config.favorites_path);
            let collection = catalog.collection(language).await;
            let mut state = ViewState::new(collection, config.page_size);
            if let Some(category) = category {
                state = state.apply(ViewAction::CategorySelected(CategoryFilter::parse(
                    &category,
                )));
            }
            if let Some(sort) = sort {
                state = state.apply(ViewAction::SortSelected(sort));
            }
            state = state.apply(ViewAction::PageSelected(page));
            let view = state.render(&favorites.snapshot());
            if as_json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_listing(&view);
            }
            Ok(())
        }
        Command::Show { language, id } => {
            let favorites = FavoritesFile::open(&config.favorites_path);
            let collection = catalog.collection(language).await;
            let entry = collection
                .get(&id)
                .ok_or_else(|| format!("No {language} entry with id {id:?}"))?;
            let detail = EntryDetail::new(entry, favorites.snapshot().contains(&entry.id));
            if as_json {
                let payload = json!({ "language": language, "entry": detail });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_entry(language, &detail);
            }
            Ok(())
        }
        Command::Search {
            query,
            language,
            mode,
            category,
            limit,
        } => {
            if query.trim().is_empty() {
                return Err("Search query cannot be empty".into());
            }
            let languages = parse_language_scope(&language)?;
            let mut collections = Vec::with_capacity(languages.len());
            for language in languages {
                collections.push(catalog.collection(language).await);
            }
            let request = SearchRequest {
                query: query.clone(),
                mode,
                category: category
                    .as_deref()
                    .map(CategoryFilter::parse)
                    .unwrap_or_default(),
                limit: limit.clamp(1, search::MAX_SEARCH_LIMIT),
            };
            let hits =
                search::search_many(collections.iter().map(|c| &**c), &request, &config.search);
            if as_json {
                let payload = json!({
                    "query": query,
                    "mode": mode,
                    "limit": request.limit,
                    "results": hits.iter().map(|hit| json!({
                        "language": hit.language,
                        "id": hit.entry.id,
                        "transliteration": hit.entry.transliteration,
                        "meaning": hit.entry.meaning,
                        "score": hit.score,
                    })).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if hits.is_empty() {
                println!("No words matched \"{query}\" ({} search).", mode.query_value());
            } else {
                println!("{} matches for \"{query}\":", mode);
                let rows: Vec<Vec<String>> = hits
                    .iter()
                    .map(|hit| {
                        vec![
                            hit.language.slug().to_string(),
                            hit.entry.id.clone(),
                            hit.entry.transliteration.clone(),
                            hit.entry.meaning.clone(),
                            hit.score
                                .map(|score| format!("{score:.2}"))
                                .unwrap_or_else(|| "-".to_string()),
                        ]
                    })
                    .collect();
                print_table(
                    &["LANGUAGE", "ID", "TRANSLITERATION", "MEANING", "SCORE"],
                    &rows,
                );
            }
            Ok(())
        }
        Command::Categories { language } => {
            let collection = catalog.collection(language).await;
            let categories = listing::categories(collection.entries());
            if as_json {
                let payload = json!({
                    "language": language,
                    "categories": categories.iter().map(|(name, count)| {
                        json!({ "name": name, "count": count })
                    }).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                let rows: Vec<Vec<String>> = categories
                    .into_iter()
                    .map(|(name, count)| vec![name, count.to_string()])
                    .collect();
                print_table(&["CATEGORY", "WORDS"], &rows);
            }
            Ok(())
        }
        Command::Today { language } => {
            let day = day_number(SystemTime::now());
            let languages = language.map(|l| vec![l]).unwrap_or_else(|| Language::ALL.to_vec());
            let mut featured = Vec::new();
            for language in languages {
                let collection = catalog.collection(language).await;
                if let Some(entry) = entry_of_the_day(collection.entries(), day) {
                    featured.push((language, EntryDetail::new(entry, false)));
                }
            }
            if as_json {
                let payload: Vec<_> = featured
                    .iter()
                    .map(|(language, detail)| json!({ "language": language, "entry": detail }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for (language, detail) in &featured {
                    println!("{} word of the day:", language.display_name());
                    print_entry(*language, detail);
                    println!();
                }
            }
            Ok(())
        }
        Command::Favorites(FavoritesCommand::List) => {
            let favorites = FavoritesFile::open(&config.favorites_path).snapshot();
            let mut collections: Vec<Arc<Collection>> = Vec::new();
            for language in Language::ALL {
                collections.push(catalog.collection(language).await);
            }
            let resolved: Vec<(&str, Option<(Language, &Entry)>)> = favorites
                .iter()
                .map(|id| {
                    let found = collections.iter().find_map(|collection| {
                        collection.get(id).map(|entry| (collection.language(), entry))
                    });
                    (id, found)
                })
                .collect();
            if as_json {
                let payload: Vec<_> = resolved
                    .iter()
                    .map(|(id, found)| match found {
                        Some((language, entry)) => json!({
                            "id": id,
                            "language": language,
                            "transliteration": entry.transliteration,
                            "meaning": entry.meaning,
                        }),
                        None => json!({ "id": id, "language": null }),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if resolved.is_empty() {
                println!("No favorites saved in {}.", config.favorites_path.display());
            } else {
                let rows: Vec<Vec<String>> = resolved
                    .iter()
                    .map(|(id, found)| match found {
                        Some((language, entry)) => vec![
                            language.slug().to_string(),
                            id.to_string(),
                            entry.transliteration.clone(),
                            entry.meaning.clone(),
                        ],
                        None => vec![
                            "?".to_string(),
                            id.to_string(),
                            String::new(),
                            "<not in any collection>".to_string(),
                        ],
                    })
                    .collect();
                print_table(&["LANGUAGE", "ID", "TRANSLITERATION", "MEANING"], &rows);
            }
            Ok(())
        }
        Command::Favorites(FavoritesCommand::Toggle { language, id }) => {
            let collection = catalog.collection(language).await;
            if collection.get(&id).is_none() {
                return Err(format!("No {language} entry with id {id:?}").into());
            }
            let store = FavoritesFile::open(&config.favorites_path);
            let saved = store.toggle(&id)?;
            if as_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "id": id, "favorite": saved }))?
                );
            } else if saved {
                println!("Saved {id} to {}.", store.path().display());
            } else {
                println!("Removed {id} from {}.", store.path().display());
            }
            Ok(())
        }
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            base_url,
            theme,
            no_openapi,
        } => {
            use ancient_lexicon::web::{WebConfig, WebTheme, serve};
            let theme: WebTheme = theme.parse()?;
            let web_config = WebConfig {
                addr,
                enable_openapi: !no_openapi,
                theme,
                base_url: base_url
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| format!("http://{addr}")),
                lexicon: config,
            };
            serve(web_config).await?;
            Ok(())
        }
    }
}

fn parse_language_scope(value: &str) -> Result<Vec<Language>, Box<dyn Error>> {
    if value.trim().eq_ignore_ascii_case("all") {
        return Ok(Language::ALL.to_vec());
    }
    Ok(vec![value.parse::<Language>()?])
}

fn print_listing(view: &ListingView) {
    let language = view.language;
    println!(
        "{} words ({} data), category {}, sorted by {}",
        language.display_name(),
        view.origin,
        view.category,
        view.sort.label().to_lowercase()
    );
    match &view.body {
        ListingBody::NoResults => println!("{NO_RESULTS_MESSAGE}."),
        ListingBody::Cards(cards) => {
            let rows: Vec<Vec<String>> = cards
                .iter()
                .map(|card| {
                    vec![
                        if card.favorite { "*" } else { "" }.to_string(),
                        card.id.clone(),
                        card.glyph.clone(),
                        card.transliteration.clone(),
                        card.meaning.clone(),
                        card.category.clone(),
                        card.period.clone(),
                        card.classification.clone(),
                    ]
                })
                .collect();
            print_table(
                &[
                    "",
                    "ID",
                    "GLYPH",
                    "TRANSLITERATION",
                    "MEANING",
                    "CATEGORY",
                    "PERIOD",
                    &language.classification_label().to_uppercase(),
                ],
                &rows,
            );
        }
    }
    println!();
    println!("{}", view.info.text);
    if let Some(line) = format_pagination(&view.controls) {
        println!("{line}");
    }
    println!("{}", view.controls.summary);
}

fn format_pagination(controls: &PaginationControls) -> Option<String> {
    if controls.items.is_empty() {
        return None;
    }
    let parts: Vec<String> = controls
        .items
        .iter()
        .map(|item| match item {
            PaginationItem::Previous { page } => format!("‹ {page}"),
            PaginationItem::Page {
                page,
                current: true,
            } => format!("[{page}]"),
            PaginationItem::Page { page, .. } => page.to_string(),
            PaginationItem::Ellipsis => "…".to_string(),
            PaginationItem::Next { page } => format!("{page} ›"),
        })
        .collect();
    Some(parts.join(" "))
}

fn print_entry(language: Language, detail: &EntryDetail) {
    println!("{}  {} (ID {})", detail.glyph, detail.transliteration, detail.id);
    println!("Meaning: {}", detail.meaning);
    if let Some(pronunciation) = &detail.pronunciation {
        println!("Pronunciation: {pronunciation}");
    }
    println!("Category: {}", detail.category);
    if !detail.periods.is_empty() {
        println!("Periods: {}", detail.periods);
    }
    if let Some(code) = &detail.classification {
        println!("{}: {code}", language.classification_label());
    }
    if detail.favorite {
        println!("Saved to favorites");
    }
    if !detail.usage.is_empty() {
        println!("\nUsage:");
        for example in &detail.usage {
            println!("- {example}");
        }
    }
    if let Some(notes) = &detail.notes {
        render_markdown_block("Notes", notes);
    }
    if let Some(etymology) = &detail.etymology {
        render_markdown_block("Etymology", etymology);
    }
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let line = |cells: Vec<String>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };
    line(headers.iter().map(|h| h.to_string()).collect());
    line(widths.iter().map(|w| "-".repeat(*w)).collect());
    for row in rows {
        line(row.clone());
    }
}

fn pad(cell: &str, width: usize) -> String {
    let count = cell.chars().count();
    format!("{cell}{}", " ".repeat(width.saturating_sub(count)))
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ancient_lexicon::render::render_pagination_controls;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn list_arguments_parse() {
        let cli = Cli::parse_from([
            "ancient-lexicon",
            "--bundled",
            "list",
            "sumerian",
            "--page",
            "2",
            "--sort",
            "sign_name",
        ]);
        match cli.command {
            Command::List {
                language,
                page,
                sort,
                ..
            } => {
                assert_eq!(language, Language::Sumerian);
                assert_eq!(page, 2);
                assert_eq!(sort, Some(SortKey::Classification));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.config().unwrap().source, DataSource::Bundled);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let cli = Cli::parse_from(["ancient-lexicon", "--page-size", "0", "categories", "egyptian"]);
        assert!(cli.config().is_err());
    }

    #[test]
    fn language_scope_accepts_all() {
        assert_eq!(parse_language_scope("all").unwrap(), Language::ALL.to_vec());
        assert_eq!(
            parse_language_scope("cuneiform").unwrap(),
            vec![Language::Sumerian]
        );
        assert!(parse_language_scope("latin").is_err());
    }

    #[test]
    fn pagination_line_marks_current_page() {
        let line = format_pagination(&render_pagination_controls(2, 3, 20)).unwrap();
        assert_eq!(line, "‹ 1 1 [2] 3 3 ›");
        assert!(format_pagination(&render_pagination_controls(1, 0, 20)).is_none());
    }
}

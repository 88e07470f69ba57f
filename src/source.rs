//! Loading a language collection: remote fetch or local directory, falling
//! back to the bundled collection on any failure.

use crate::data::{Entry, Language};
use crate::raw;
use crate::search::SearchIndex;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Where a language's data file is read from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DataSource {
    /// `<base_url>/<language>.json` over HTTP.
    Remote { base_url: String },
    /// `<dir>/<language>.json` on disk.
    Directory(PathBuf),
    /// Never leave the binary.
    #[default]
    Bundled,
}

impl DataSource {
    pub fn location(&self, language: Language) -> Option<String> {
        match self {
            DataSource::Remote { base_url } => Some(format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                language.data_file_name()
            )),
            DataSource::Directory(dir) => Some(
                dir.join(language.data_file_name())
                    .display()
                    .to_string(),
            ),
            DataSource::Bundled => None,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Remote { base_url } => write!(f, "remote {base_url}"),
            DataSource::Directory(dir) => write!(f, "directory {}", dir.display()),
            DataSource::Bundled => write!(f, "bundled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Remote,
    Directory,
    Bundled,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Remote => write!(f, "remote"),
            Origin::Directory => write!(f, "directory"),
            Origin::Bundled => write!(f, "bundled"),
        }
    }
}

/// One language's entries, immutable once loaded.
#[derive(Debug)]
pub struct Collection {
    language: Language,
    origin: Origin,
    generation: u64,
    entries: Vec<Entry>,
    search_index: OnceCell<SearchIndex>,
}

impl Collection {
    pub fn new(language: Language, origin: Origin, entries: Vec<Entry>) -> Self {
        Self {
            language,
            origin,
            generation: 0,
            entries,
            search_index: OnceCell::new(),
        }
    }

    pub fn bundled(language: Language) -> Self {
        Self::new(
            language,
            Origin::Bundled,
            crate::bundled_entries(language).to_vec(),
        )
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Load number assigned by the catalog; 0 for collections built directly.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Prefix index over transliterations and meaning words, built on first use.
    pub fn search_index(&self) -> &SearchIndex {
        self.search_index
            .get_or_init(|| SearchIndex::build(&self.entries))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{location} is not a valid collection: {source}")]
    Malformed {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fetches collections from a [`DataSource`].
#[derive(Clone)]
pub struct EntryLoader {
    client: reqwest::Client,
    source: DataSource,
}

impl EntryLoader {
    pub fn new(source: DataSource) -> Self {
        Self {
            client: reqwest::Client::new(),
            source,
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Loads `language`, substituting the bundled collection when the source
    /// cannot be read. Never fails.
    pub async fn load(&self, language: Language) -> Collection {
        match self.try_load(language).await {
            Ok(collection) => {
                debug!(
                    %language,
                    origin = %collection.origin(),
                    entries = collection.len(),
                    "collection loaded"
                );
                collection
            }
            Err(err) => {
                warn!(%language, source = %self.source, error = %err, "falling back to bundled collection");
                Collection::bundled(language)
            }
        }
    }

    pub async fn try_load(&self, language: Language) -> Result<Collection, LoadError> {
        match &self.source {
            DataSource::Bundled => Ok(Collection::bundled(language)),
            DataSource::Remote { .. } => {
                let url = self.source.location(language).unwrap_or_default();
                let bytes = self.fetch(&url).await?;
                parse(language, Origin::Remote, &bytes, url)
            }
            DataSource::Directory(dir) => {
                let path = dir.join(language.data_file_name());
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|source| LoadError::Io {
                        path: path.clone(),
                        source,
                    })?;
                parse(
                    language,
                    Origin::Directory,
                    &bytes,
                    path.display().to_string(),
                )
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let network = |source: reqwest::Error| LoadError::Network {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(network)?;
        Ok(body.to_vec())
    }
}

fn parse(
    language: Language,
    origin: Origin,
    bytes: &[u8],
    location: String,
) -> Result<Collection, LoadError> {
    let normalized = raw::parse_collection(bytes, language).map_err(|source| {
        LoadError::Malformed {
            location: location.clone(),
            source,
        }
    })?;
    if !normalized.duplicate_ids.is_empty() {
        warn!(
            %language,
            %location,
            duplicates = ?normalized.duplicate_ids,
            "dropped records with repeated ids"
        );
    }
    if normalized.synthesized_ids > 0 {
        debug!(%language, count = normalized.synthesized_ids, "synthesized missing ids");
    }
    Ok(Collection::new(language, origin, normalized.entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn remote_collection_is_normalized() {
        let base_url = serve_once(
            "200 OK",
            r#"{"words":[{"id":"EG900","hieroglyph":"𓋹","transliteration":"ꜥnḫ","translation":"life","category":"concepts","period":"OK"}]}"#,
        )
        .await;
        let loader = EntryLoader::new(DataSource::Remote { base_url });
        let collection = loader.load(Language::Egyptian).await;
        assert_eq!(collection.origin(), Origin::Remote);
        assert_eq!(collection.len(), 1);
        let entry = collection.get("EG900").unwrap();
        assert_eq!(entry.meaning, "life");
        assert_eq!(entry.periods, vec!["OK".to_string()]);
    }

    #[tokio::test]
    async fn server_error_is_a_status_failure() {
        let base_url = serve_once("500 Internal Server Error", "{}").await;
        let loader = EntryLoader::new(DataSource::Remote { base_url });
        let err = loader.try_load(Language::Sumerian).await.unwrap_err();
        assert!(matches!(err, LoadError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn malformed_body_falls_back_to_bundled() {
        let base_url = serve_once("200 OK", r#"{"entries":[]}"#).await;
        let loader = EntryLoader::new(DataSource::Remote { base_url });
        let collection = loader.load(Language::Sumerian).await;
        assert_eq!(collection.origin(), Origin::Bundled);
        assert!(!collection.is_empty());
        assert!(collection.get("SU001").is_some());
    }

    #[tokio::test]
    async fn missing_directory_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let loader = EntryLoader::new(DataSource::Directory(dir.path().to_path_buf()));
        assert!(matches!(
            loader.try_load(Language::Egyptian).await,
            Err(LoadError::Io { .. })
        ));
        let collection = loader.load(Language::Egyptian).await;
        assert_eq!(collection.origin(), Origin::Bundled);
    }

    #[tokio::test]
    async fn directory_source_reads_language_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sumerian.json"),
            r#"{"words":[{"id":"SU900","cuneiform":"𒀭","sign_name":"AN","meaning":"sky"}]}"#,
        )
        .unwrap();
        let loader = EntryLoader::new(DataSource::Directory(dir.path().to_path_buf()));
        let collection = loader.load(Language::Sumerian).await;
        assert_eq!(collection.origin(), Origin::Directory);
        assert_eq!(collection.entries()[0].classification.as_deref(), Some("AN"));
    }

    #[test]
    fn remote_location_joins_language_file() {
        let source = DataSource::Remote {
            base_url: "https://example.org/data/".into(),
        };
        assert_eq!(
            source.location(Language::Egyptian).as_deref(),
            Some("https://example.org/data/egyptian.json")
        );
        assert_eq!(DataSource::Bundled.location(Language::Egyptian), None);
    }
}

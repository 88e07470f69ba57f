use parking_lot::Mutex;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bytes escaped inside one identifier of a cookie value.
const COOKIE_ID: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b',')
    .add(b';')
    .add(b'\\');

/// Entry identifiers the user has saved, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Favorites {
    ids: Vec<String>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    /// Removes `id` if present, appends it otherwise. Returns whether `id` is
    /// a favorite afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if let Some(position) = self.ids.iter().position(|existing| existing == id) {
            self.ids.remove(position);
            false
        } else {
            self.ids.push(id.to_string());
            true
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.ids).unwrap_or_else(|_| "[]".to_string())
    }

    /// Parses a JSON array of identifiers. Anything else reads as an empty
    /// set; duplicates collapse to their first occurrence.
    pub fn from_json(text: &str) -> Self {
        match serde_json::from_str::<Vec<String>>(text) {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => {
                warn!(error = %err, "ignoring malformed favorites payload");
                Self::default()
            }
        }
    }

    /// Comma-separated identifiers, each percent-encoded only where a cookie
    /// value needs it.
    pub fn to_cookie_value(&self) -> String {
        self.ids
            .iter()
            .map(|id| utf8_percent_encode(id, COOKIE_ID).to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Reads [`Favorites::to_cookie_value`] output. A percent-encoded JSON
    /// array, as older cookies hold, is accepted too.
    pub fn from_cookie_value(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with('[') || value.starts_with("%5B") {
            return Self::from_json(&percent_decode_str(value).decode_utf8_lossy());
        }
        value
            .split(',')
            .map(|id| percent_decode_str(id).decode_utf8_lossy().into_owned())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

impl FromIterator<String> for Favorites {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut favorites = Favorites::default();
        for id in iter {
            if !favorites.contains(&id) {
                favorites.ids.push(id);
            }
        }
        favorites
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FavoritesError {
    #[error("failed to write favorites to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Favorites persisted as a JSON array in a file.
pub struct FavoritesFile {
    path: PathBuf,
    inner: Mutex<Favorites>,
}

impl FavoritesFile {
    /// Opens the store at `path`. A missing file is an empty set; an
    /// unreadable or malformed one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let favorites = match fs::read_to_string(&path) {
            Ok(text) => Favorites::from_json(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Favorites::default(),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to read favorites file");
                Favorites::default()
            }
        };
        debug!(count = favorites.len(), path = %path.display(), "favorites loaded");
        Self {
            path,
            inner: Mutex::new(favorites),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Favorites {
        self.inner.lock().clone()
    }

    pub fn toggle(&self, id: &str) -> Result<bool, FavoritesError> {
        let mut guard = self.inner.lock();
        let mut updated = guard.clone();
        let now_favorite = updated.toggle(id);
        write_atomically(&self.path, updated.to_json().as_bytes()).map_err(|source| {
            FavoritesError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        *guard = updated;
        Ok(now_favorite)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    // Each writer gets its own temporary file next to the target.
    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

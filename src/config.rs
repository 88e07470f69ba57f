//! Runtime settings: defaults, overlaid by `LEXICON_*` environment variables.

use crate::listing::DEFAULT_PAGE_SIZE;
use crate::search::SearchConfig;
use crate::source::DataSource;
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_SOURCE_URL: &str = "LEXICON_SOURCE_URL";
pub const ENV_DATA_DIR: &str = "LEXICON_DATA_DIR";
pub const ENV_PAGE_SIZE: &str = "LEXICON_PAGE_SIZE";
pub const ENV_FAVORITES: &str = "LEXICON_FAVORITES";
pub const ENV_FUZZY_MIN: &str = "LEXICON_FUZZY_MIN";
pub const DEFAULT_FAVORITES_FILE: &str = "lexicon-favorites.json";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LexiconConfig {
    pub source: DataSource,
    pub page_size: usize,
    pub favorites_path: PathBuf,
    pub search: SearchConfig,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Bundled,
            page_size: DEFAULT_PAGE_SIZE,
            favorites_path: PathBuf::from(DEFAULT_FAVORITES_FILE),
            search: SearchConfig::default(),
        }
    }
}

impl LexiconConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup. A source URL wins
    /// over a data directory when both are set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = var(ENV_SOURCE_URL) {
            config.source = DataSource::Remote {
                base_url: url.trim().to_string(),
            };
        } else if let Some(dir) = var(ENV_DATA_DIR) {
            config.source = DataSource::Directory(PathBuf::from(dir));
        }

        if let Some(raw) = var(ENV_PAGE_SIZE) {
            config.page_size = match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => return Err(ConfigError::invalid(ENV_PAGE_SIZE, "expected a positive integer")),
            };
        }

        if let Some(path) = var(ENV_FAVORITES) {
            config.favorites_path = PathBuf::from(path);
        }

        if let Some(raw) = var(ENV_FUZZY_MIN) {
            config.search.min_score = match raw.trim().parse::<f64>() {
                Ok(score) if (0.0..=1.0).contains(&score) => score,
                _ => {
                    return Err(ConfigError::invalid(
                        ENV_FUZZY_MIN,
                        "expected a number between 0 and 1",
                    ));
                }
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_correct() {
        let config = LexiconConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.source, DataSource::Bundled);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.favorites_path, PathBuf::from("lexicon-favorites.json"));
        assert!((config.search.min_score - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn env_overrides_apply() {
        let config = LexiconConfig::from_lookup(lookup(&[
            (ENV_SOURCE_URL, "https://example.org/data"),
            (ENV_DATA_DIR, "/srv/lexicon"),
            (ENV_PAGE_SIZE, "12"),
            (ENV_FUZZY_MIN, "0.8"),
        ]))
        .unwrap();
        assert_eq!(
            config.source,
            DataSource::Remote {
                base_url: "https://example.org/data".into()
            }
        );
        assert_eq!(config.page_size, 12);
        assert!((config.search.min_score - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn data_dir_used_without_url() {
        let config = LexiconConfig::from_lookup(lookup(&[(ENV_DATA_DIR, "data")])).unwrap();
        assert_eq!(config.source, DataSource::Directory(PathBuf::from("data")));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = LexiconConfig::from_lookup(lookup(&[(ENV_PAGE_SIZE, "0")])).unwrap_err();
        assert!(err.to_string().contains(ENV_PAGE_SIZE));
        assert!(LexiconConfig::from_lookup(lookup(&[(ENV_FUZZY_MIN, "7")])).is_err());
    }
}

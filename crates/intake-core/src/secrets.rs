//! KEY=VALUE secrets merged into every handler environment.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Immutable after load. Ordered so environment construction is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecretsMap {
    entries: BTreeMap<String, String>,
}

impl SecretsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank lines, `#` comments and lines without `=` are ignored.
    /// The value is everything after the first `=`.
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .filter(|(key, _)| !key.trim().is_empty())
            .map(|(key, value)| (key.trim().to_string(), value.to_string()))
            .collect();
        Self { entries }
    }

    pub fn read(path: &Path) -> Result<Self> {
        std::fs::read_to_string(path)
            .map(|content| Self::parse(&content))
            .map_err(|source| Error::SecretsUnreadable {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Missing file means no secrets. Never fails.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("No secrets file at {}; running without secrets", path.display());
            return Self::default();
        }
        match Self::read(path) {
            Ok(secrets) => {
                tracing::info!(count = secrets.len(), "Secrets loaded from {}", path.display());
                secrets
            }
            Err(e) => {
                tracing::warn!("{}; running without secrets", e);
                Self::default()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretsMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

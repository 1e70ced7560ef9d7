//! Error types for intake

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("registry not found: {}", .0.display())]
    RegistryMissing(PathBuf),

    #[error("registry entry #{index} skipped: {reason}")]
    RegistryEntry { index: usize, reason: String },

    #[error("duplicate node {name}: keeping the first declaration")]
    DuplicateNode { name: String },

    #[error("secrets file unreadable: {}: {}", .path.display(), .source)]
    SecretsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn registry_entry(index: usize, reason: impl Into<String>) -> Self {
        Self::RegistryEntry {
            index,
            reason: reason.into(),
        }
    }

    pub fn duplicate_node(name: impl Into<String>) -> Self {
        Self::DuplicateNode { name: name.into() }
    }
}

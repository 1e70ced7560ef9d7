//! Dispatcher configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Top-level intake configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Filesystem layout.
    pub paths: PathsConfig,
    /// Poll loop and subprocess limits.
    pub dispatch: DispatchConfig,
    /// Council fallbacks and extension classes.
    pub routing: RoutingConfig,
    /// Wrapper naming convention.
    pub wrappers: WrapperConfig,
}

/// Paths are resolved against `root` unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub root: PathBuf,
    /// Drop directory scanned each cycle.
    pub watch_dir: PathBuf,
    /// YAML node registry.
    pub registry: PathBuf,
    /// Directory holding `Call_<Name>.<ext>` wrappers.
    pub wrappers_dir: PathBuf,
    /// Optional KEY=VALUE secrets file.
    pub secrets: PathBuf,
    /// Rolling log file directory.
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Sleep between scans in milliseconds.
    pub poll_interval_ms: u64,
    /// Hard limit per handler invocation.
    pub handler_timeout_secs: u64,
    /// Files dispatched in parallel within a cycle. 1 = strictly sequential.
    pub max_concurrent_files: usize,
    /// Content sample size for text-like files.
    pub signal_max_bytes: usize,
    /// Startup warning threshold for files already sitting in the watch directory.
    pub oversize_warn_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Handler chosen when nothing matches a code file.
    pub code_fallback: String,
    /// Handler chosen when nothing matches any other file.
    pub generic_fallback: String,
    /// Extensions whose content is sampled into the signal.
    pub text_extensions: Vec<String>,
    /// Extensions routed to `code_fallback`.
    pub code_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    /// Accepted wrapper extensions, in resolution order.
    pub extensions: Vec<String>,
    /// Node whose wrapper is started once as a background daemon.
    pub observer: Option<String>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            dispatch: DispatchConfig::default(),
            routing: RoutingConfig::default(),
            wrappers: WrapperConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            watch_dir: PathBuf::from("inbox"),
            registry: PathBuf::from("registry.yaml"),
            wrappers_dir: PathBuf::from("wrappers"),
            secrets: PathBuf::from(".env"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            handler_timeout_secs: 120,
            max_concurrent_files: 1,
            signal_max_bytes: 4_096,
            oversize_warn_mb: 50,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            code_fallback: "MURPHY".into(),
            generic_fallback: "ATLAS".into(),
            text_extensions: ["txt", "md", "py", "js", "json", "yaml", "yml", "ps1", "sh", "csv"]
                .map(String::from)
                .to_vec(),
            code_extensions: ["py", "js", "ts", "sh", "ps1"].map(String::from).to_vec(),
        }
    }
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            extensions: default_wrapper_extensions(),
            observer: Some("OBSERVER".into()),
        }
    }
}

/// PowerShell wrappers take precedence on Windows, shell scripts elsewhere.
pub fn default_wrapper_extensions() -> Vec<String> {
    if cfg!(windows) {
        vec!["ps1".into(), "sh".into()]
    } else {
        vec!["sh".into(), "ps1".into()]
    }
}

// ============================================================
// Loading
// ============================================================

impl IntakeConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

impl PathsConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn watch_dir(&self) -> PathBuf {
        self.resolve(&self.watch_dir)
    }

    pub fn registry(&self) -> PathBuf {
        self.resolve(&self.registry)
    }

    pub fn wrappers_dir(&self) -> PathBuf {
        self.resolve(&self.wrappers_dir)
    }

    pub fn secrets(&self) -> PathBuf {
        self.resolve(&self.secrets)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.log_dir)
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

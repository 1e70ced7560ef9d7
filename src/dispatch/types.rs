use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the loop is within a cycle. Logged on transitions at trace level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scan,
    Route,
    Dispatch,
    Record,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Scan => write!(f, "scan"),
            Self::Route => write!(f, "route"),
            Self::Dispatch => write!(f, "dispatch"),
            Self::Record => write!(f, "record"),
        }
    }
}

/// Paths already dispatched this run. Only grows.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    paths: HashSet<PathBuf>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the path was already recorded.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        self.paths.insert(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HandlerOutcome {
    Completed { exit_code: Option<i32>, success: bool },
    MissingWrapper,
    TimedOut { after_secs: u64 },
    Failed { error: String },
}

impl std::fmt::Display for HandlerOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed { exit_code: Some(code), .. } => write!(f, "completed (exit {code})"),
            Self::Completed { exit_code: None, .. } => write!(f, "completed (signalled)"),
            Self::MissingWrapper => write!(f, "missing wrapper"),
            Self::TimedOut { after_secs } => write!(f, "timed out after {after_secs}s"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HandlerReport {
    pub handler: String,
    pub args: Vec<String>,
    pub outcome: HandlerOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub path: PathBuf,
    /// Council order.
    pub handlers: Vec<String>,
    pub reports: Vec<HandlerReport>,
}

impl FileReport {
    pub fn failures(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| !matches!(r.outcome, HandlerOutcome::Completed { success: true, .. }))
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub poll_interval: Duration,
    /// 1 dispatches files strictly one after another.
    pub max_concurrent_files: usize,
    /// Print each non-empty cycle report as a JSON line on stdout.
    pub json_stdout: bool,
    /// Run a single cycle and stop.
    pub once: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_concurrent_files: 1,
            json_stdout: false,
            once: false,
        }
    }
}

//! Handler nodes and file events

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Role assigned to nodes synthesized from a wrapper filename.
pub const AUTO_ROLE: &str = "Auto-Generated Connector";
/// Primary capability of a synthesized node.
pub const AUTO_CAPABILITY: &str = "wrapper";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeOrigin {
    /// Declared in the registry document.
    Declared,
    /// Synthesized from a `Call_<Name>` wrapper found on disk.
    Discovered,
}

impl fmt::Display for NodeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared => write!(f, "declared"),
            Self::Discovered => write!(f, "discovered"),
        }
    }
}

/// A named external capability the dispatcher can invoke.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HandlerNode {
    /// Upper-case normalized, unique within a registry.
    pub name: String,
    /// Lower-cased, non-blank, first occurrence kept.
    pub triggers: Vec<String>,
    pub role: String,
    pub primary_capability: String,
    pub origin: NodeOrigin,
}

impl HandlerNode {
    pub fn declared<I, S>(name: &str, triggers: I, role: &str, primary_capability: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: normalize_name(name),
            triggers: normalize_triggers(triggers),
            role: role.to_string(),
            primary_capability: primary_capability.to_string(),
            origin: NodeOrigin::Declared,
        }
    }

    /// Node synthesized from a wrapper stem: its only trigger is its own name.
    pub fn discovered(name: &str) -> Self {
        let name = normalize_name(name);
        Self {
            triggers: vec![name.to_lowercase()],
            name,
            role: AUTO_ROLE.to_string(),
            primary_capability: AUTO_CAPABILITY.to_string(),
            origin: NodeOrigin::Discovered,
        }
    }

    pub fn can_match(&self) -> bool {
        !self.triggers.is_empty()
    }

    /// Number of triggers contained in `signal`. The signal must already be lower-cased.
    pub fn score(&self, signal: &str) -> usize {
        self.triggers
            .iter()
            .filter(|t| signal.contains(t.as_str()))
            .count()
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

fn normalize_triggers<I, S>(triggers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for t in triggers {
        let t = t.as_ref().to_lowercase();
        if t.trim().is_empty() || out.contains(&t) {
            continue;
        }
        out.push(t);
    }
    out
}

/// A file seen in the watch directory during one scan.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FileEvent {
    pub path: PathBuf,
    pub name: String,
    pub stem: String,
    /// Without the leading dot; empty when the file has none.
    pub extension: String,
}

impl FileEvent {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lossy = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
        };
        Self {
            name: lossy(path.file_name()),
            stem: lossy(path.file_stem()),
            extension: lossy(path.extension()),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Case-insensitive membership test. Entries may be written with or without the dot.
    pub fn has_extension_in(&self, set: &[String]) -> bool {
        !self.extension.is_empty()
            && set
                .iter()
                .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&self.extension))
    }
}

impl fmt::Display for FileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_node_normalizes_name_and_triggers() {
        let node = HandlerNode::declared(" atlas ", ["Log", "log", "", "  ", "Build"], "Intake", "shell");
        assert_eq!(node.name, "ATLAS");
        assert_eq!(node.triggers, vec!["log", "build"]);
        assert_eq!(node.origin, NodeOrigin::Declared);
    }

    #[test]
    fn discovered_node_triggers_on_own_name() {
        let node = HandlerNode::discovered("Oculus");
        assert_eq!(node.name, "OCULUS");
        assert_eq!(node.triggers, vec!["oculus"]);
        assert_eq!(node.role, AUTO_ROLE);
        assert_eq!(node.primary_capability, AUTO_CAPABILITY);
    }

    #[test]
    fn score_counts_substring_hits() {
        let node = HandlerNode::declared("muse", ["paper", "white", "audio"], "", "");
        assert_eq!(node.score("whitepaper.md whitepaper md"), 2);
        assert_eq!(node.score("song.wav song wav"), 0);
    }

    #[test]
    fn file_event_parts() {
        let ev = FileEvent::from_path("/drop/Build.LOG");
        assert_eq!(ev.name, "Build.LOG");
        assert_eq!(ev.stem, "Build");
        assert_eq!(ev.extension, "LOG");
        assert!(ev.has_extension_in(&["log".to_string()]));
        assert!(ev.has_extension_in(&[".Log".to_string()]));
    }

    #[test]
    fn file_event_without_extension() {
        let ev = FileEvent::from_path("/drop/Makefile");
        assert_eq!(ev.stem, "Makefile");
        assert!(ev.extension.is_empty());
        assert!(!ev.has_extension_in(&["".to_string()]));
    }
}

//! Handler registry: declared nodes from YAML plus nodes discovered from wrappers.
//!
//! The registry document looks like:
//!
//! ```yaml
//! nodes:
//!   - name: ATLAS
//!     role: General Intake
//!     primary_tool: archive
//!     trigger_on: [log, report]
//! ```
//!
//! Any `Call_<Name>.<ext>` wrapper whose name is not declared becomes an
//! auto-generated node that triggers on its own lowercased name.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{normalize_name, HandlerNode, NodeOrigin};

/// Filename prefix of every wrapper.
pub const WRAPPER_PREFIX: &str = "Call_";

#[derive(Debug, Default, Deserialize)]
struct RegistryDoc {
    #[serde(default)]
    nodes: Option<Vec<NodeEntry>>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    primary_tool: Option<String>,
    #[serde(default)]
    trigger_on: Option<Vec<String>>,
}

/// Ordered, name-unique set of handler nodes. Immutable once loaded.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    nodes: Vec<HandlerNode>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless its normalized name is already taken.
    /// Returns false when the node was rejected as a duplicate.
    pub fn register(&mut self, node: HandlerNode) -> bool {
        if self.contains(&node.name) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&HandlerNode> {
        let wanted = normalize_name(name);
        self.nodes.iter().find(|n| n.name == wanted)
    }

    pub fn nodes(&self) -> &[HandlerNode] {
        &self.nodes
    }

    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn count(&self, origin: NodeOrigin) -> usize {
        self.nodes.iter().filter(|n| n.origin == origin).count()
    }

    /// Parse declared nodes from a YAML document. Entries without a name and
    /// duplicate names are skipped and reported; the first declaration wins.
    pub fn from_yaml(content: &str) -> Result<(Self, Vec<Error>)> {
        let mut registry = Self::new();
        let mut diagnostics = Vec::new();
        if content.trim().is_empty() {
            return Ok((registry, diagnostics));
        }
        let doc: Option<RegistryDoc> = serde_yaml::from_str(content)?;
        let entries = doc.and_then(|d| d.nodes).unwrap_or_default();

        for (index, entry) in entries.into_iter().enumerate() {
            let Some(name) = entry.name.filter(|n| !n.trim().is_empty()) else {
                diagnostics.push(Error::registry_entry(index, "missing name"));
                continue;
            };
            let node = HandlerNode::declared(
                &name,
                entry.trigger_on.unwrap_or_default(),
                entry.role.as_deref().unwrap_or_default(),
                entry.primary_tool.as_deref().unwrap_or_default(),
            );
            let normalized = node.name.clone();
            if !registry.register(node) {
                diagnostics.push(Error::duplicate_node(normalized));
            }
        }

        Ok((registry, diagnostics))
    }

    /// Load the registry document, then augment from the wrapper directory.
    ///
    /// Never fails: a missing or unparsable document leaves only discovered
    /// nodes, and the problem is returned as a diagnostic.
    pub fn load(source: &Path, wrappers_dir: &Path, wrapper_extensions: &[String]) -> (Self, Vec<Error>) {
        let (mut registry, mut diagnostics) = match std::fs::read_to_string(source) {
            Ok(content) => match Self::from_yaml(&content) {
                Ok(parsed) => parsed,
                Err(e) => (Self::new(), vec![e]),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Self::new(), vec![Error::RegistryMissing(source.to_path_buf())])
            }
            Err(e) => (Self::new(), vec![Error::Io(e)]),
        };

        match registry.augment_from_wrappers(wrappers_dir, wrapper_extensions) {
            Ok(added) => {
                tracing::debug!(added, dir = %wrappers_dir.display(), "dynamic nodes augmented");
            }
            Err(e) if !wrappers_dir.exists() => {
                tracing::debug!("no wrapper directory at {}: {}", wrappers_dir.display(), e);
            }
            Err(e) => diagnostics.push(e),
        }

        tracing::info!(
            declared = registry.count(NodeOrigin::Declared),
            discovered = registry.count(NodeOrigin::Discovered),
            "registry loaded"
        );
        (registry, diagnostics)
    }

    /// Append one discovered node per unclaimed `Call_<Name>.<ext>` wrapper.
    /// Returns how many nodes were added.
    pub fn augment_from_wrappers(&mut self, dir: &Path, extensions: &[String]) -> Result<usize> {
        let mut names: Vec<String> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter_map(|p| wrapper_node_name(&p, extensions))
            .collect();
        names.sort();

        let mut seen = HashSet::new();
        let mut added = 0;
        for name in names {
            if !seen.insert(normalize_name(&name)) {
                continue;
            }
            if self.register(HandlerNode::discovered(&name)) {
                added += 1;
            }
        }
        Ok(added)
    }
}

/// `Call_Atlas.sh` → `Some("Atlas")` when `sh` is an accepted extension.
pub fn wrapper_node_name(path: &Path, extensions: &[String]) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !extensions
        .iter()
        .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    {
        return None;
    }
    let name = path.file_stem()?.to_str()?.strip_prefix(WRAPPER_PREFIX)?;
    (!name.trim().is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["sh".into(), "ps1".into()]
    }

    #[test]
    fn parses_declared_nodes() {
        let (reg, diags) = Registry::from_yaml(
            "nodes:\n  - name: atlas\n    role: General Intake\n    primary_tool: archive\n    trigger_on: [log, Report]\n",
        )
        .unwrap();
        assert!(diags.is_empty());
        let atlas = reg.get("Atlas").unwrap();
        assert_eq!(atlas.name, "ATLAS");
        assert_eq!(atlas.triggers, vec!["log", "report"]);
        assert_eq!(atlas.role, "General Intake");
        assert_eq!(atlas.primary_capability, "archive");
    }

    #[test]
    fn duplicate_declaration_first_wins() {
        let (reg, diags) = Registry::from_yaml(
            "nodes:\n  - name: muse\n    trigger_on: [paper]\n  - name: MUSE\n    trigger_on: [audio]\n",
        )
        .unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("MUSE").unwrap().triggers, vec!["paper"]);
        assert!(matches!(&diags[..], [Error::DuplicateNode { name }] if name == "MUSE"));
    }

    #[test]
    fn nameless_entry_is_reported() {
        let (reg, diags) =
            Registry::from_yaml("nodes:\n  - role: orphan\n  - name: nova\n").unwrap();
        assert_eq!(reg.names(), vec!["NOVA"]);
        assert!(matches!(&diags[..], [Error::RegistryEntry { index: 0, .. }]));
    }

    #[test]
    fn null_triggers_are_empty() {
        let (reg, _) = Registry::from_yaml("nodes:\n  - name: quiet\n    trigger_on:\n").unwrap();
        assert!(!reg.get("QUIET").unwrap().can_match());
    }

    #[test]
    fn empty_document_is_empty_registry() {
        let (reg, diags) = Registry::from_yaml("").unwrap();
        assert!(reg.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn wrapper_name_requires_prefix_and_extension() {
        let e = exts();
        assert_eq!(wrapper_node_name(Path::new("w/Call_Atlas.sh"), &e).as_deref(), Some("Atlas"));
        assert_eq!(wrapper_node_name(Path::new("w/Call_Nova.PS1"), &e).as_deref(), Some("Nova"));
        assert_eq!(wrapper_node_name(Path::new("w/Call_Atlas.py"), &e), None);
        assert_eq!(wrapper_node_name(Path::new("w/Atlas.sh"), &e), None);
        assert_eq!(wrapper_node_name(Path::new("w/Call_.sh"), &e), None);
    }
}

//! Council routing: which handlers receive a file, and in what order.
//!
//! Every node with triggers is scored by how many of its triggers appear in
//! the file's signal. All scoring nodes are returned, highest score first,
//! name as tie-break. When nothing scores, exactly one fallback is chosen by
//! extension, so a route is never empty.

use std::sync::Arc;

use crate::config::RoutingConfig;
use crate::registry::Registry;
use crate::signal::SignalBuilder;
use crate::types::{normalize_name, FileEvent};

/// A node's score against one signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub name: String,
    pub score: usize,
}

#[derive(Clone, Debug)]
pub struct Council {
    registry: Arc<Registry>,
    signals: SignalBuilder,
    code_fallback: String,
    generic_fallback: String,
    code_extensions: Vec<String>,
}

impl Council {
    pub fn new(registry: Arc<Registry>, signals: SignalBuilder, routing: &RoutingConfig) -> Self {
        Self {
            registry,
            signals,
            code_fallback: normalize_name(&routing.code_fallback),
            generic_fallback: normalize_name(&routing.generic_fallback),
            code_extensions: routing.code_extensions.clone(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Ordered handler names for `file`. Never empty.
    pub fn route(&self, file: &FileEvent) -> Vec<String> {
        let signal = self.signals.build(file);
        let verdicts = self.score(&signal);
        if verdicts.is_empty() {
            let fallback = self.fallback_for(file).to_string();
            tracing::debug!(file = %file.name, handler = %fallback, "no trigger matched, using fallback");
            return vec![fallback];
        }
        let selected: Vec<String> = verdicts.into_iter().map(|v| v.name).collect();
        tracing::debug!(file = %file.name, ?selected, "council selected");
        selected
    }

    /// Scoring nodes sorted by `(-score, name)`. Nodes without triggers are skipped.
    pub fn score(&self, signal: &str) -> Vec<Verdict> {
        let signal = signal.to_lowercase();
        let mut verdicts: Vec<Verdict> = self
            .registry
            .nodes()
            .iter()
            .filter(|node| node.can_match())
            .map(|node| Verdict {
                name: node.name.clone(),
                score: node.score(&signal),
            })
            .filter(|v| v.score > 0)
            .collect();
        verdicts.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        verdicts
    }

    pub fn fallback_for(&self, file: &FileEvent) -> &str {
        if file.has_extension_in(&self.code_extensions) {
            &self.code_fallback
        } else {
            &self.generic_fallback
        }
    }
}

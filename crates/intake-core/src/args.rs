//! Argument table: per-handler positional argument builders
//!
//! Each handler name maps to a pure function of the triggering file, the
//! secrets map and the intake root. Handlers without an entry receive the
//! file's absolute path as their only argument.
//! To add a handler: write a builder function, register it in
//! create_default_table() below.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::secrets::SecretsMap;
use crate::types::{normalize_name, FileEvent};

/// Everything a builder may look at.
#[derive(Clone, Copy, Debug)]
pub struct ArgContext<'a> {
    pub file: &'a FileEvent,
    pub secrets: &'a SecretsMap,
    pub root: &'a Path,
}

impl ArgContext<'_> {
    fn lower_name(&self) -> String {
        self.file.name.to_lowercase()
    }
}

pub type ArgBuilder = Arc<dyn Fn(&ArgContext<'_>) -> Vec<String> + Send + Sync>;

pub struct ArgTable {
    builders: HashMap<String, ArgBuilder>,
    fallback: ArgBuilder,
}

impl Default for ArgTable {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for ArgTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.list();
        names.sort_unstable();
        f.debug_struct("ArgTable").field("handlers", &names).finish()
    }
}

impl ArgTable {
    /// Empty table: every handler gets the default path argument.
    pub fn new() -> Self {
        Self { builders: HashMap::new(), fallback: Arc::new(path_args) }
    }

    /// Register a builder. Replaces any existing builder for the same handler.
    pub fn register<F>(&mut self, handler: &str, builder: F)
    where
        F: Fn(&ArgContext<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.builders.insert(normalize_name(handler), Arc::new(builder));
    }

    /// Remove a builder by handler name.
    pub fn remove(&mut self, handler: &str) -> bool {
        self.builders.remove(&normalize_name(handler)).is_some()
    }

    pub fn contains(&self, handler: &str) -> bool {
        self.builders.contains_key(&normalize_name(handler))
    }

    pub fn build(&self, handler: &str, ctx: &ArgContext<'_>) -> Vec<String> {
        match self.builders.get(&normalize_name(handler)) {
            Some(builder) => builder(ctx),
            None => (self.fallback)(ctx),
        }
    }

    pub fn list(&self) -> Vec<&str> {
        self.builders.keys().map(|s| s.as_str()).collect()
    }
}

/// Create the argument table for every handler with bespoke rules.
///
/// Edit this function to add or remove handlers.
pub fn create_default_table() -> ArgTable {
    let mut table = ArgTable::new();
    table.register("BRIDGE", bridge_args);
    table.register("MUSE", muse_args);
    table.register("SENTINEL", sentinel_args);
    table.register("NOVA", root_args);
    table.register("OCULUS", root_args);
    table.register("BUILDER", builder_args);
    table
}

/// Default builder: the file's absolute path.
pub fn path_args(ctx: &ArgContext<'_>) -> Vec<String> {
    vec![absolute(&ctx.file.path).display().to_string()]
}

/// Connectivity actions keyed on `warp` / `mcp` in the filename.
/// `disconnect` is tested before `connect`, which it contains.
fn bridge_args(ctx: &ArgContext<'_>) -> Vec<String> {
    let name = ctx.lower_name();
    if name.contains("warp") {
        let action = ["disconnect", "connect", "register"]
            .into_iter()
            .find(|a| name.contains(a))
            .unwrap_or("status");
        return vec!["warp".into(), action.into()];
    }
    if name.contains("mcp") {
        return vec!["mcp_client".into(), "list".into()];
    }
    Vec::new()
}

fn muse_args(ctx: &ArgContext<'_>) -> Vec<String> {
    let name = ctx.lower_name();
    if name.contains("whitepaper") {
        vec!["whitepaper".into(), ctx.file.name.clone()]
    } else if name.contains("data") {
        vec!["data".into(), "traffic".into()]
    } else {
        vec!["marketing".into(), ctx.file.name.clone()]
    }
}

/// `[action, role, user]`, role and user taken from secrets.
fn sentinel_args(ctx: &ArgContext<'_>) -> Vec<String> {
    let action = if ctx.lower_name().contains("grant") { "grant" } else { "verify" };
    vec![
        action.into(),
        ctx.secrets.get_or("HEADY_ROLE", "ADMIN").into(),
        ctx.secrets.get_or("HEADY_USER", "USER").into(),
    ]
}

fn root_args(ctx: &ArgContext<'_>) -> Vec<String> {
    vec![ctx.root.display().to_string()]
}

const DEFAULT_PROJECT: &str = "HeadyProject";

/// Project name derived from the stem, e.g. `init-solar.txt` → `solar`.
fn builder_args(ctx: &ArgContext<'_>) -> Vec<String> {
    let stem = ctx.file.stem.replace("new_project", "").replace("init", "");
    let project = stem.trim_matches(|c| c == '-' || c == '_' || c == ' ');
    if project.is_empty() {
        vec![DEFAULT_PROJECT.into()]
    } else {
        vec![project.into()]
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

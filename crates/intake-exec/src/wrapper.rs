//! Wrapper resolution: `Call_<Name>.<ext>` lookup and command construction

use std::path::{Path, PathBuf};
use tokio::process::Command;

use intake_core::registry::{wrapper_node_name, WRAPPER_PREFIX};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapperKind {
    /// Executed directly.
    Native,
    /// Run through `powershell -ExecutionPolicy Bypass -File`.
    PowerShell,
}

/// A resolved, existing wrapper file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wrapper {
    pub path: PathBuf,
    pub kind: WrapperKind,
}

impl Wrapper {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ps1") => WrapperKind::PowerShell,
            _ => WrapperKind::Native,
        };
        Self { path, kind }
    }

    /// Program and leading arguments, before the synthesized ones.
    pub fn argv(&self) -> Vec<String> {
        let path = self.path.display().to_string();
        match self.kind {
            WrapperKind::Native => vec![path],
            WrapperKind::PowerShell => vec![
                "powershell".into(),
                "-ExecutionPolicy".into(),
                "Bypass".into(),
                "-File".into(),
                path,
            ],
        }
    }

    pub fn command(&self, args: &[String]) -> Command {
        let argv = self.argv();
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]).args(args);
        cmd
    }
}

/// Finds wrappers in one directory, trying extensions in order.
#[derive(Clone, Debug)]
pub struct WrapperResolver {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl WrapperResolver {
    pub fn new(dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            extensions,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `ATLAS` → `Call_Atlas.sh`, then `Call_Atlas.ps1`, then any
    /// case-insensitive `Call_atlas.<ext>` in the directory.
    pub fn resolve(&self, handler: &str) -> Option<Wrapper> {
        let title = title_case(handler);
        for ext in &self.extensions {
            let candidate = self
                .dir
                .join(format!("{}{}.{}", WRAPPER_PREFIX, title, ext.trim_start_matches('.')));
            if candidate.is_file() {
                return Some(Wrapper::new(candidate));
            }
        }
        self.scan(handler)
    }

    fn scan(&self, handler: &str) -> Option<Wrapper> {
        let mut matches: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                wrapper_node_name(p, &self.extensions).is_some_and(|n| n.eq_ignore_ascii_case(handler))
            })
            .collect();
        // Honour extension preference, then name, so the pick is stable.
        matches.sort_by_key(|p| {
            let rank = p
                .extension()
                .and_then(|e| e.to_str())
                .and_then(|e| {
                    self.extensions
                        .iter()
                        .position(|x| x.trim_start_matches('.').eq_ignore_ascii_case(e))
                })
                .unwrap_or(usize::MAX);
            (rank, p.clone())
        });
        matches.into_iter().next().map(Wrapper::new)
    }

    /// Every `Call_*` file with an accepted extension, sorted.
    pub fn list(&self) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && wrapper_node_name(p, &self.extensions).is_some())
            .collect();
        found.sort();
        found
    }
}

/// Capitalize the first letter of each alphabetic run, lowercase the rest:
/// `ATLAS` → `Atlas`, `DEEP_SCAN` → `Deep_Scan`.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alpha = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

//! Startup: directory bootstrap, one validation pass, observer daemon.
//!
//! Validation only warns. It runs once before the first cycle and never
//! inside the loop.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use intake_core::IntakeConfig;
use intake_exec::{spawn_daemon, Daemon, WrapperResolver};

use super::context::DispatchContext;
use super::scan;

/// Create the watch and log directories. Failing to create the watch
/// directory makes dispatch impossible, so that error is returned. A log
/// directory problem comes back as an issue, since this runs before logging.
pub fn ensure_infrastructure(config: &IntakeConfig) -> std::io::Result<Vec<SetupIssue>> {
    std::fs::create_dir_all(config.paths.watch_dir())?;
    let log_dir = config.paths.log_dir();
    Ok(match std::fs::create_dir_all(&log_dir) {
        Ok(()) => Vec::new(),
        Err(e) => vec![SetupIssue::LogDirUnavailable {
            path: log_dir,
            reason: e.to_string(),
        }],
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupIssue {
    MissingRegistry(PathBuf),
    MissingWrapperDir(PathBuf),
    NoWrappers(PathBuf),
    NotExecutable(PathBuf),
    Oversized { path: PathBuf, bytes: u64 },
    LogDirUnavailable { path: PathBuf, reason: String },
}

impl fmt::Display for SetupIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRegistry(p) => write!(f, "registry file missing: {}", p.display()),
            Self::MissingWrapperDir(p) => write!(f, "wrapper directory missing: {}", p.display()),
            Self::NoWrappers(p) => write!(f, "no wrapper scripts in {}", p.display()),
            Self::NotExecutable(p) => write!(f, "wrapper missing execute permission: {}", p.display()),
            Self::Oversized { path, bytes } => write!(
                f,
                "oversized file in watch dir: {} ({:.2} MB)",
                path.display(),
                *bytes as f64 / (1024.0 * 1024.0)
            ),
            Self::LogDirUnavailable { path, reason } => {
                write!(f, "log dir unavailable, console only: {}: {}", path.display(), reason)
            }
        }
    }
}

/// Collect every setup issue. Duplicate registry names are reported by the
/// registry loader itself.
pub fn validate(config: &IntakeConfig) -> Vec<SetupIssue> {
    let paths = &config.paths;
    let mut issues = Vec::new();

    let registry = paths.registry();
    if !registry.is_file() {
        issues.push(SetupIssue::MissingRegistry(registry));
    }

    let wrappers_dir = paths.wrappers_dir();
    if !wrappers_dir.is_dir() {
        issues.push(SetupIssue::MissingWrapperDir(wrappers_dir));
    } else {
        let wrappers = WrapperResolver::new(&wrappers_dir, config.wrappers.extensions.clone()).list();
        if wrappers.is_empty() {
            issues.push(SetupIssue::NoWrappers(wrappers_dir));
        }
        issues.extend(
            wrappers
                .into_iter()
                .filter(|p| !is_executable(p))
                .map(SetupIssue::NotExecutable),
        );
    }

    let limit = config.dispatch.oversize_warn_mb.saturating_mul(1024 * 1024);
    for path in scan::list_files(&paths.watch_dir()).unwrap_or_default() {
        let bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if bytes > limit {
            issues.push(SetupIssue::Oversized { path, bytes });
        }
    }

    issues
}

/// Log every issue; returns how many there were.
pub fn report_issues(issues: &[SetupIssue]) -> usize {
    for issue in issues {
        warn!("setup issue: {}", issue);
    }
    if issues.is_empty() {
        info!("startup validation passed");
    }
    issues.len()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    // PowerShell wrappers are run through the interpreter, not exec'd.
    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("ps1")) {
        return true;
    }
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Start the observer wrapper, if configured and present. The returned daemon
/// must be held for the life of the dispatcher; dropping it kills it.
pub fn start_observer(ctx: &DispatchContext, observer: Option<&str>) -> Option<Daemon> {
    let name = observer?;
    let Some(wrapper) = ctx.resolver.resolve(name) else {
        warn!(observer = name, "observer wrapper not found");
        return None;
    };
    match spawn_daemon(&wrapper, &ctx.secrets) {
        Ok(daemon) => {
            info!(observer = name, pid = ?daemon.id(), "observer daemon started");
            Some(daemon)
        }
        Err(e) => {
            warn!(observer = name, "observer start failed: {}", e);
            None
        }
    }
}

//! Immutable state shared by every cycle, built once at startup.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use intake_core::{create_default_table, ArgTable, Council, IntakeConfig, Registry, SecretsMap, SignalBuilder};
use intake_exec::{Invoker, WrapperResolver};

pub struct DispatchContext {
    pub council: Council,
    pub args: ArgTable,
    pub secrets: SecretsMap,
    pub resolver: WrapperResolver,
    pub invoker: Arc<dyn Invoker>,
    /// Intake root, handed to handlers that operate on the whole tree.
    pub root: PathBuf,
    pub watch_dir: PathBuf,
}

impl DispatchContext {
    /// Load secrets and registry from the configured paths. Every problem is
    /// logged and degraded; nothing here fails.
    pub fn from_config(config: &IntakeConfig, invoker: Arc<dyn Invoker>) -> Self {
        let paths = &config.paths;
        let secrets = SecretsMap::load(&paths.secrets());

        let (registry, diagnostics) = Registry::load(
            &paths.registry(),
            &paths.wrappers_dir(),
            &config.wrappers.extensions,
        );
        for d in &diagnostics {
            warn!("registry: {}", d);
        }
        info!(nodes = ?registry.names(), "council seated");

        let signals = SignalBuilder::new(
            config.routing.text_extensions.clone(),
            config.dispatch.signal_max_bytes,
        );

        Self {
            council: Council::new(Arc::new(registry), signals, &config.routing),
            args: create_default_table(),
            secrets,
            resolver: WrapperResolver::new(paths.wrappers_dir(), config.wrappers.extensions.clone()),
            invoker,
            root: paths.root.clone(),
            watch_dir: paths.watch_dir(),
        }
    }

    pub fn registry(&self) -> &Registry {
        self.council.registry()
    }
}

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use intake::dispatch::{self, DispatchContext, DispatchOptions, Dispatcher};
use intake::logging::init_tracing;
use intake_core::IntakeConfig;
use intake_exec::ProcessInvoker;

#[derive(Parser)]
#[command(
    name = "intake",
    about = "Watch a drop directory and dispatch each new file to its handler council"
)]
struct Cli {
    /// Intake root; relative config paths resolve against it
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to config file (TOML). Default: <root>/intake.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dump default config as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Override the poll interval in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Override the per-handler timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Files dispatched in parallel (1 = strictly sequential)
    #[arg(long)]
    concurrency: Option<usize>,

    /// JSON log lines on stderr
    #[arg(long)]
    log_json: bool,

    /// Emit each non-empty cycle report as JSON on stdout
    #[arg(long)]
    json_stdout: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        print!("{}", IntakeConfig::default().to_toml());
        return Ok(());
    }

    let root = std::path::absolute(&cli.root)?;
    let config_path = cli.config.clone().unwrap_or_else(|| root.join("intake.toml"));
    let mut config = IntakeConfig::load(&config_path);
    config.paths.root = root;
    if let Some(ms) = cli.poll_ms {
        config.dispatch.poll_interval_ms = ms;
    }
    if let Some(secs) = cli.timeout_secs {
        config.dispatch.handler_timeout_secs = secs;
    }
    if let Some(n) = cli.concurrency {
        config.dispatch.max_concurrent_files = n.max(1);
    }

    let bootstrap_issues = dispatch::ensure_infrastructure(&config)?;
    let log_dir = config.paths.log_dir();
    let _log_guard = init_tracing(bootstrap_issues.is_empty().then_some(log_dir.as_path()), cli.log_json)?;
    for issue in &bootstrap_issues {
        warn!("setup issue: {}", issue);
    }

    info!(
        root = %config.paths.root.display(),
        watch_dir = %config.paths.watch_dir().display(),
        registry = %config.paths.registry().display(),
        wrappers_dir = %config.paths.wrappers_dir().display(),
        timeout_secs = config.dispatch.handler_timeout_secs,
        "intake starting"
    );

    let invoker = ProcessInvoker::new(config.dispatch.handler_timeout())
        .with_working_dir(config.paths.root.clone());
    let ctx = Arc::new(DispatchContext::from_config(&config, Arc::new(invoker)));

    dispatch::report_issues(&dispatch::validate(&config));
    let observer = dispatch::start_observer(&ctx, config.wrappers.observer.as_deref());

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let options = DispatchOptions {
        poll_interval: config.dispatch.poll_interval(),
        max_concurrent_files: config.dispatch.max_concurrent_files.max(1),
        json_stdout: cli.json_stdout,
        once: cli.once,
    };
    Dispatcher::new(ctx, options).run(cancel).await;

    if let Some(daemon) = observer {
        daemon.stop().await;
        info!("observer stopped");
    }
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("interrupt received"),
        _ = terminate => info!("terminate received"),
    }
    cancel.cancel();
}

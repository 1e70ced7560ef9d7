use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use intake_core::{ArgContext, FileEvent};
use intake_exec::ExecError;

use super::context::DispatchContext;
use super::scan;
use super::types::*;

/// Owns the processed set and drives SCAN → ROUTE → DISPATCH → RECORD.
pub struct Dispatcher {
    ctx: Arc<DispatchContext>,
    options: DispatchOptions,
    processed: ProcessedSet,
    cycle: u64,
}

impl Dispatcher {
    pub fn new(ctx: Arc<DispatchContext>, options: DispatchOptions) -> Self {
        Self {
            ctx,
            options,
            processed: ProcessedSet::new(),
            cycle: 0,
        }
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    /// Poll until cancelled (or after one cycle with `once`). Returns the
    /// processed set so callers can inspect what was handled.
    pub async fn run(mut self, cancel: CancellationToken) -> ProcessedSet {
        info!(
            watch_dir = %self.ctx.watch_dir.display(),
            poll_ms = self.options.poll_interval.as_millis() as u64,
            max_concurrent_files = self.options.max_concurrent_files,
            "dispatcher online"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let report = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // Dropping the cycle aborts its tasks; kill_on_drop reaps the children.
                    warn!("cycle abandoned on shutdown");
                    break;
                }
                report = self.run_cycle() => report,
            };
            self.emit(&report);

            if self.options.once {
                break;
            }

            trace!(phase = %Phase::Idle);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }

        info!(processed = self.processed.len(), "session adjourned");
        self.processed
    }

    /// One full cycle. Every file found new in SCAN is recorded as processed
    /// once its dispatch finishes, whatever the handlers did.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let started_at = Utc::now();

        trace!(phase = %Phase::Scan, cycle = self.cycle);
        let new = match scan::new_files(&self.ctx.watch_dir, &self.processed) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %self.ctx.watch_dir.display(), "scan failed: {}", e);
                Vec::new()
            }
        };

        let paths: Vec<_> = new.iter().map(|f| f.path.clone()).collect();
        let mut files = if self.options.max_concurrent_files <= 1 {
            let mut reports = Vec::with_capacity(new.len());
            for file in new {
                reports.push(dispatch_file(&self.ctx, file).await);
            }
            reports
        } else {
            self.dispatch_concurrent(new).await
        };

        trace!(phase = %Phase::Record, cycle = self.cycle);
        for path in paths {
            self.processed.insert(path);
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        CycleReport {
            cycle: self.cycle,
            started_at,
            files,
        }
    }

    /// Files run in parallel up to the configured bound; each file keeps its
    /// own handler order.
    async fn dispatch_concurrent(&self, new: Vec<FileEvent>) -> Vec<FileReport> {
        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_files));
        let mut set = JoinSet::new();
        for file in new {
            let ctx = Arc::clone(&self.ctx);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                dispatch_file(&ctx, file).await
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("file task failed: {}", e),
            }
        }
        reports
    }

    fn emit(&self, report: &CycleReport) {
        if report.files.is_empty() {
            debug!(cycle = report.cycle, "poll_cycle: nothing new");
            return;
        }
        let failures: usize = report.files.iter().map(FileReport::failures).sum();
        info!(
            cycle = report.cycle,
            files = report.files.len(),
            failures,
            processed = self.processed.len(),
            "poll_cycle"
        );
        if self.options.json_stdout {
            println!("{}", serde_json::to_string(report).unwrap_or_default());
        }
    }
}

/// Route one file and run its handlers in council order.
pub async fn dispatch_file(ctx: &DispatchContext, file: FileEvent) -> FileReport {
    info!(file = %file.name, ">>> incoming");

    trace!(phase = %Phase::Route, file = %file.name);
    let handlers = ctx.council.route(&file);
    info!(file = %file.name, handlers = ?handlers, "council convened");

    trace!(phase = %Phase::Dispatch, file = %file.name);
    let mut reports = Vec::with_capacity(handlers.len());
    for handler in &handlers {
        reports.push(dispatch_handler(ctx, &file, handler).await);
    }

    FileReport {
        file: file.name.clone(),
        path: file.path.clone(),
        handlers,
        reports,
    }
}

async fn dispatch_handler(ctx: &DispatchContext, file: &FileEvent, handler: &str) -> HandlerReport {
    let started = Instant::now();
    let report = |args: Vec<String>, outcome: HandlerOutcome| HandlerReport {
        handler: handler.to_string(),
        args,
        outcome,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    let Some(wrapper) = ctx.resolver.resolve(handler) else {
        warn!(handler, file = %file.name, "missing wrapper, skipping");
        return report(Vec::new(), HandlerOutcome::MissingWrapper);
    };

    let args = ctx.args.build(
        handler,
        &ArgContext {
            file,
            secrets: &ctx.secrets,
            root: &ctx.root,
        },
    );
    info!(handler, file = %file.name, ?args, "summoning");

    match ctx.invoker.invoke(&wrapper, &args, &ctx.secrets).await {
        Ok(output) => {
            let stdout = output.stdout.trim();
            let stderr = output.stderr.trim();
            if !stdout.is_empty() {
                info!(handler, "{}", stdout);
            }
            if !stderr.is_empty() {
                warn!(handler, "{}", stderr);
            }
            debug!(handler, exit_code = ?output.exit_code, elapsed_ms = output.elapsed.as_millis() as u64, "handler finished");
            report(
                args,
                HandlerOutcome::Completed {
                    exit_code: output.exit_code,
                    success: output.success,
                },
            )
        }
        Err(ExecError::Timeout(after)) => {
            error!(handler, file = %file.name, "timed out after {}s", after.as_secs());
            report(args, HandlerOutcome::TimedOut { after_secs: after.as_secs() })
        }
        Err(e) => {
            error!(handler, file = %file.name, "execution error: {}", e);
            report(args, HandlerOutcome::Failed { error: e.to_string() })
        }
    }
}

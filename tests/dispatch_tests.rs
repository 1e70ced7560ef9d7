//! Dispatcher tests against a recording invoker: no real processes.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use intake::dispatch::{DispatchContext, DispatchOptions, Dispatcher, HandlerOutcome};
use intake_core::{IntakeConfig, SecretsMap};
use intake_exec::{ExecError, HandlerOutput, Invoker, Wrapper};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Timeout,
}

#[derive(Default)]
struct RecordingInvoker {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    behaviors: HashMap<String, Behavior>,
    default: Option<Behavior>,
}

impl RecordingInvoker {
    fn failing() -> Self {
        Self {
            default: Some(Behavior::Fail),
            ..Default::default()
        }
    }

    fn with(mut self, wrapper_file: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(wrapper_file.to_string(), behavior);
        self
    }

    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    fn wrappers_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|(w, _)| w).collect()
    }
}

#[async_trait::async_trait]
impl Invoker for RecordingInvoker {
    async fn invoke(
        &self,
        wrapper: &Wrapper,
        args: &[String],
        _secrets: &SecretsMap,
    ) -> Result<HandlerOutput, ExecError> {
        let file = wrapper
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().unwrap().push((file.clone(), args.to_vec()));

        let behavior = self
            .behaviors
            .get(&file)
            .copied()
            .or(self.default)
            .unwrap_or(Behavior::Succeed);
        match behavior {
            Behavior::Succeed => Ok(HandlerOutput {
                exit_code: Some(0),
                success: true,
                stdout: format!("{file} ok"),
                stderr: String::new(),
                elapsed: Duration::from_millis(1),
            }),
            Behavior::Fail => Err(ExecError::Spawn {
                program: file,
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            }),
            Behavior::Timeout => Err(ExecError::Timeout(Duration::from_secs(120))),
        }
    }
}

const REGISTRY: &str = "\
nodes:
  - name: BRIDGE
    role: Connectivity
    primary_tool: bridge
    trigger_on: [warp]
  - name: SENTINEL
    role: Access
    primary_tool: guard
    trigger_on: [warp, key]
  - name: ALPHA
    trigger_on: [alpha]
  - name: ATLAS
  - name: MURPHY
";

struct Fixture {
    _tmp: TempDir,
    config: IntakeConfig,
}

impl Fixture {
    fn new(wrappers: &[&str]) -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = IntakeConfig::default();
        config.paths.root = tmp.path().to_path_buf();
        fs::create_dir_all(config.paths.watch_dir()).unwrap();
        fs::create_dir_all(config.paths.wrappers_dir()).unwrap();
        fs::write(config.paths.registry(), REGISTRY).unwrap();
        for name in wrappers {
            fs::write(config.paths.wrappers_dir().join(name), "#!/bin/sh\n").unwrap();
        }
        Self { _tmp: tmp, config }
    }

    fn drop_file(&self, name: &str) {
        fs::write(self.config.paths.watch_dir().join(name), "").unwrap();
    }

    fn dispatcher(&self, invoker: Arc<RecordingInvoker>, options: DispatchOptions) -> Dispatcher {
        let ctx = DispatchContext::from_config(&self.config, invoker);
        Dispatcher::new(Arc::new(ctx), options)
    }
}

const ALL: &[&str] = &["Call_Bridge.sh", "Call_Alpha.sh", "Call_Atlas.sh", "Call_Murphy.sh"];

#[tokio::test]
async fn each_file_is_dispatched_once_even_when_handlers_fail() {
    let fx = Fixture::new(ALL);
    fx.drop_file("a.log");
    fx.drop_file("b.txt");
    let invoker = Arc::new(RecordingInvoker::failing());
    let mut dispatcher = fx.dispatcher(invoker.clone(), DispatchOptions::default());

    let first = dispatcher.run_cycle().await;
    assert_eq!(first.files.len(), 2);
    assert!(first.files.iter().all(|f| f.failures() == 1));
    assert_eq!(dispatcher.processed().len(), 2);

    let second = dispatcher.run_cycle().await;
    assert!(second.files.is_empty());
    assert_eq!(invoker.calls().len(), 2);

    fx.drop_file("c.py");
    let third = dispatcher.run_cycle().await;
    assert_eq!(third.files.len(), 1);
    assert_eq!(third.files[0].handlers, vec!["MURPHY"]);
    assert_eq!(invoker.calls().len(), 3);
}

#[tokio::test]
async fn unmatched_files_reach_the_fallbacks() {
    let fx = Fixture::new(ALL);
    fx.drop_file("image.png");
    fx.drop_file("script.py");
    let invoker = Arc::new(RecordingInvoker::default());
    let mut dispatcher = fx.dispatcher(invoker.clone(), DispatchOptions::default());

    let report = dispatcher.run_cycle().await;
    let routed: Vec<_> = report
        .files
        .iter()
        .map(|f| (f.file.as_str(), f.handlers.clone()))
        .collect();
    assert_eq!(
        routed,
        vec![
            ("image.png", vec!["ATLAS".to_string()]),
            ("script.py", vec!["MURPHY".to_string()]),
        ]
    );
    assert_eq!(invoker.wrappers_called(), vec!["Call_Atlas.sh", "Call_Murphy.sh"]);
}

#[tokio::test]
async fn missing_wrapper_does_not_block_later_handlers() {
    let fx = Fixture::new(ALL);
    fx.drop_file("warp_key.txt");
    let invoker = Arc::new(RecordingInvoker::default());
    let mut dispatcher = fx.dispatcher(invoker.clone(), DispatchOptions::default());

    let report = dispatcher.run_cycle().await;
    let file = &report.files[0];
    assert_eq!(file.handlers, vec!["SENTINEL", "BRIDGE"]);
    assert_eq!(file.reports[0].outcome, HandlerOutcome::MissingWrapper);
    assert_eq!(
        file.reports[1].outcome,
        HandlerOutcome::Completed { exit_code: Some(0), success: true }
    );
    assert_eq!(
        invoker.calls(),
        vec![("Call_Bridge.sh".to_string(), vec!["warp".to_string(), "status".to_string()])]
    );
}

#[tokio::test]
async fn timeout_does_not_block_later_handlers() {
    let fx = Fixture::new(ALL);
    fx.drop_file("alpha_warp.txt");
    let invoker = Arc::new(RecordingInvoker::default().with("Call_Alpha.sh", Behavior::Timeout));
    let mut dispatcher = fx.dispatcher(invoker.clone(), DispatchOptions::default());

    let report = dispatcher.run_cycle().await;
    let file = &report.files[0];
    // SENTINEL scores on "warp" too but has no wrapper.
    assert_eq!(file.handlers, vec!["ALPHA", "BRIDGE", "SENTINEL"]);
    assert_eq!(file.reports[0].outcome, HandlerOutcome::TimedOut { after_secs: 120 });
    assert!(matches!(file.reports[1].outcome, HandlerOutcome::Completed { success: true, .. }));
    assert_eq!(file.reports[2].outcome, HandlerOutcome::MissingWrapper);
    assert_eq!(invoker.wrappers_called(), vec!["Call_Alpha.sh", "Call_Bridge.sh"]);
    assert_eq!(file.failures(), 2);
}

#[tokio::test]
async fn bridge_action_prefers_disconnect() {
    let fx = Fixture::new(ALL);
    fx.drop_file("warp_disconnect.txt");
    let invoker = Arc::new(RecordingInvoker::default());
    let mut dispatcher = fx.dispatcher(invoker.clone(), DispatchOptions::default());

    dispatcher.run_cycle().await;
    assert_eq!(
        invoker.calls(),
        vec![("Call_Bridge.sh".to_string(), vec!["warp".to_string(), "disconnect".to_string()])]
    );
}

#[tokio::test]
async fn concurrent_cycle_covers_every_file() {
    let fx = Fixture::new(ALL);
    for name in ["e.log", "d.log", "c.log", "b.log", "a.log"] {
        fx.drop_file(name);
    }
    let invoker = Arc::new(RecordingInvoker::default());
    let options = DispatchOptions {
        max_concurrent_files: 3,
        ..Default::default()
    };
    let mut dispatcher = fx.dispatcher(invoker.clone(), options);

    let report = dispatcher.run_cycle().await;
    let names: Vec<_> = report.files.iter().map(|f| f.file.as_str()).collect();
    assert_eq!(names, vec!["a.log", "b.log", "c.log", "d.log", "e.log"]);
    assert_eq!(invoker.calls().len(), 5);
    assert_eq!(dispatcher.processed().len(), 5);
}

#[tokio::test]
async fn run_once_stops_after_one_cycle() {
    let fx = Fixture::new(ALL);
    fx.drop_file("a.log");
    let invoker = Arc::new(RecordingInvoker::default());
    let options = DispatchOptions {
        once: true,
        poll_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let processed = fx
        .dispatcher(invoker.clone(), options)
        .run(CancellationToken::new())
        .await;
    assert_eq!(processed.len(), 1);
    assert!(processed.contains(&fx.config.paths.watch_dir().join("a.log")));
}

#[tokio::test]
async fn cancelled_run_dispatches_nothing() {
    let fx = Fixture::new(ALL);
    fx.drop_file("a.log");
    let invoker = Arc::new(RecordingInvoker::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let processed = fx
        .dispatcher(invoker.clone(), DispatchOptions::default())
        .run(cancel)
        .await;
    assert!(processed.is_empty());
    assert!(invoker.calls().is_empty());
}

#[tokio::test]
async fn cancel_during_idle_stops_the_loop() {
    let fx = Fixture::new(ALL);
    fx.drop_file("a.log");
    let invoker = Arc::new(RecordingInvoker::default());
    let options = DispatchOptions {
        poll_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(fx.dispatcher(invoker.clone(), options).run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    let processed = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(processed.len(), 1);
    assert_eq!(invoker.calls().len(), 1);
}

#[tokio::test]
async fn missing_watch_dir_yields_empty_cycles() {
    let fx = Fixture::new(ALL);
    fs::remove_dir(fx.config.paths.watch_dir()).unwrap();
    let invoker = Arc::new(RecordingInvoker::default());
    let mut dispatcher = fx.dispatcher(invoker.clone(), DispatchOptions::default());

    assert!(dispatcher.run_cycle().await.files.is_empty());
    assert!(invoker.calls().is_empty());
}

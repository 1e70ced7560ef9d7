//! Handler invocation: run a wrapper with a hard timeout and captured output

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tracing::debug;

use intake_core::SecretsMap;

use crate::wrapper::Wrapper;

/// Captured streams are cut to this many bytes.
pub const MAX_CAPTURE_BYTES: usize = 30_000;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait: {0}")]
    Wait(#[source] std::io::Error),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl ExecError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// What a finished handler left behind. The exit code is informational.
#[derive(Clone, Debug)]
pub struct HandlerOutput {
    /// `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs a resolved wrapper. Implemented by [`ProcessInvoker`]; tests substitute
/// a recording fake.
#[async_trait::async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        wrapper: &Wrapper,
        args: &[String],
        secrets: &SecretsMap,
    ) -> Result<HandlerOutput, ExecError>;
}

pub struct ProcessInvoker {
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl ProcessInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait::async_trait]
impl Invoker for ProcessInvoker {
    /// Spawns the wrapper as the leader of a fresh process group and races the
    /// wait against the timeout. On expiry, or if this future is dropped, the
    /// whole group is killed, so anything the wrapper started dies with it.
    async fn invoke(
        &self,
        wrapper: &Wrapper,
        args: &[String],
        secrets: &SecretsMap,
    ) -> Result<HandlerOutput, ExecError> {
        let mut cmd = wrapper.command(args);
        cmd.envs(secrets.iter())
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(wrapper = %wrapper.path.display(), ?args, "spawning handler");
        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: wrapper.path.display().to_string(),
            source,
        })?;
        let mut group = GroupGuard::new(&child);

        // Pipes are drained concurrently with wait() so a chatty handler
        // cannot block on a full pipe.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let run = async {
            let (status, out, err) = tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
            status.map(|s| (s, out, err))
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok((status, stdout, stderr))) => {
                group.disarm();
                Ok(HandlerOutput {
                    exit_code: status.code(),
                    success: status.success(),
                    stdout,
                    stderr,
                    elapsed: started.elapsed(),
                })
            }
            Ok(Err(e)) => Err(ExecError::Wait(e)),
            Err(_) => {
                group.kill();
                reap(&mut child).await;
                Err(ExecError::Timeout(self.timeout))
            }
        }
    }
}

async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("reap after timeout failed: {}", e);
    }
}

/// Kills a child's process group when dropped unless disarmed.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers; a negative pid addresses the group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, "group kill failed: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// A wrapper started without waiting on it, such as the observer. Its whole
/// process group is killed on [`Daemon::stop`] or when dropped.
pub struct Daemon {
    child: Child,
    group: GroupGuard,
}

impl Daemon {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn stop(mut self) {
        self.group.kill();
        if let Err(e) = self.child.kill().await {
            debug!("daemon stop failed: {}", e);
        }
    }
}

/// Start a wrapper without waiting on it. Output is discarded.
pub fn spawn_daemon(wrapper: &Wrapper, secrets: &SecretsMap) -> Result<Daemon, ExecError> {
    let mut cmd = wrapper.command(&[]);
    cmd.envs(secrets.iter())
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: wrapper.path.display().to_string(),
        source,
    })?;
    let group = GroupGuard::new(&child);
    Ok(Daemon { child, group })
}

/// Read a child pipe, keeping at most [`MAX_CAPTURE_BYTES`]. The remainder is
/// drained and counted but never buffered.
async fn read_pipe(pipe: Option<impl AsyncRead + Unpin>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut kept = Vec::with_capacity(4096);
    let _ = (&mut pipe)
        .take(MAX_CAPTURE_BYTES as u64)
        .read_to_end(&mut kept)
        .await;
    let dropped = tokio::io::copy(&mut pipe, &mut tokio::io::sink())
        .await
        .unwrap_or(0);
    capture(kept, dropped)
}

fn capture(kept: Vec<u8>, dropped: u64) -> String {
    let mut s = String::from_utf8_lossy(&kept).into_owned();
    if dropped > 0 {
        let total = kept.len() as u64 + dropped;
        s.push_str(&format!("\n... [truncated, {} total bytes]", total));
    }
    s
}

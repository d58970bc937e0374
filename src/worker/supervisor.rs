//! Worker process supervisor.
//!
//! Spawns the worker with:
//! - stderr discarded and stdin/stdout inherited from the harness.
//! - `kill_on_drop(true)` so the process never outlives its handle.
//!
//! Exit is observed by a monitor task that owns the [`Child`] once
//! [`WorkerProcess::on_exit`] is registered. Stopping goes through
//! [`WorkerProcess::terminate`], which asks politely (`SIGTERM` on unix),
//! waits a grace period, then kills.

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::{AppError, Result};

/// How and why the worker terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, absent when the process was killed by a signal.
    pub code: Option<i32>,
    /// Human-readable description of the exit.
    pub reason: String,
}

impl WorkerExit {
    fn from_wait(result: std::io::Result<ExitStatus>) -> Self {
        match result {
            Ok(status) => {
                let code = status.code();
                let reason = code.map_or_else(
                    || "process terminated by signal".to_owned(),
                    |c| format!("process exited with code {c}"),
                );
                Self { code, reason }
            }
            Err(err) => Self {
                code: None,
                reason: format!("wait error: {err}"),
            },
        }
    }
}

/// Handle to a running worker process.
#[derive(Debug)]
pub struct WorkerProcess {
    program: String,
    pid: Option<u32>,
    grace: Duration,
    /// Held here until an exit callback moves it into the monitor task.
    child: Option<Child>,
    monitor: Option<JoinHandle<()>>,
    stop: CancellationToken,
    exited: Arc<AtomicBool>,
    terminated: bool,
}

impl WorkerProcess {
    /// Spawn the worker described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the executable cannot be found or the
    /// OS refuses to start it.
    pub fn start(config: &WorkerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|err| {
            AppError::Spawn(format!("failed to spawn `{}`: {err}", config.command))
        })?;
        let pid = child.id();

        info!(
            pid = pid.unwrap_or(0),
            command = config.command,
            "worker process spawned"
        );

        Ok(Self {
            program: config.command.clone(),
            pid,
            grace: config.terminate_grace(),
            child: Some(child),
            monitor: None,
            stop: CancellationToken::new(),
            exited: Arc::new(AtomicBool::new(false)),
            terminated: false,
        })
    }

    /// OS process id captured at spawn time.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the monitor has observed the process exit.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Register `callback` to run exactly once when the worker terminates
    /// for any reason, including [`terminate`](Self::terminate).
    ///
    /// The callback runs on the monitor task and must not block.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Worker` if a callback is already registered or the
    /// process has already been terminated.
    pub fn on_exit<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(WorkerExit) + Send + 'static,
    {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| AppError::Worker("exit callback already registered".into()))?;

        let stop = self.stop.clone();
        let exited = Arc::clone(&self.exited);
        let pid = self.pid;
        let grace = self.grace;

        self.monitor = Some(tokio::spawn(async move {
            let exit = tokio::select! {
                result = child.wait() => WorkerExit::from_wait(result),
                () = stop.cancelled() => {
                    WorkerExit::from_wait(stop_child(&mut child, pid, grace).await)
                }
            };

            exited.store(true, Ordering::Release);
            info!(pid = pid.unwrap_or(0), reason = %exit.reason, "worker process exited");
            callback(exit);
        }));

        Ok(())
    }

    /// Stop the worker and reap it.
    ///
    /// Idempotent: calling it again, or after the worker already exited, is
    /// a no-op.
    pub async fn terminate(&mut self) {
        if self.terminated {
            debug!(program = self.program, "terminate: already terminated");
            return;
        }
        self.terminated = true;

        if let Some(mut child) = self.child.take() {
            let exit = WorkerExit::from_wait(stop_child(&mut child, self.pid, self.grace).await);
            self.exited.store(true, Ordering::Release);
            info!(
                pid = self.pid.unwrap_or(0),
                reason = %exit.reason,
                "worker process terminated"
            );
            return;
        }

        if let Some(monitor) = self.monitor.take() {
            self.stop.cancel();
            if let Err(err) = monitor.await {
                warn!(%err, "worker monitor task failed");
            }
        }
    }
}

/// `SIGTERM`, wait up to `grace`, then kill.
async fn stop_child(
    child: &mut Child,
    pid: Option<u32>,
    grace: Duration,
) -> std::io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) {
            if let Err(err) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
                debug!(pid = raw, %err, "failed to deliver SIGTERM to worker");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Ok(result) = tokio::time::timeout(grace, child.wait()).await {
        return result;
    }

    warn!(
        grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
        "worker ignored SIGTERM, killing"
    );
    child.kill().await?;
    child.wait().await
}

//! Worker process spawner.
//!
//! Launches `<shell> <capture script>` with:
//! - all three stdio pipes captured (queries in, candidates out, sentinel and
//!   diagnostics on stderr);
//! - the caller's environment inherited, with the configured overrides
//!   applied on top;
//! - `kill_on_drop(true)` so a dropped worker never leaves a shell behind.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::info;

use crate::{AppError, Result};

/// Everything needed to launch one worker process.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Shell executable (name resolved via `PATH`, or a path).
    pub shell: PathBuf,
    /// Capture script passed as the only argument.
    pub script: PathBuf,
    /// Working directory of the shell.
    pub cwd: PathBuf,
    /// Environment overrides; inherited variables with the same key are replaced.
    pub envs: HashMap<String, String>,
}

/// A freshly spawned worker with its three pipes detached from the child.
#[derive(Debug)]
pub struct WorkerProcess {
    /// Child handle, owned by the lifecycle monitor once the worker runs.
    pub child: Child,
    /// Query input.
    pub stdin: ChildStdin,
    /// Candidate lines.
    pub stdout: ChildStdout,
    /// Sentinel and diagnostic lines.
    pub stderr: ChildStderr,
}

/// Spawn the worker process described by `config`.
///
/// # Errors
///
/// - `AppError::Spawn { kind: NotFound, .. }` if the shell cannot be located.
/// - `AppError::Spawn { kind: Other, .. }` for any other launch failure.
/// - `AppError::Spawn { kind: Other, .. }` if a pipe could not be captured.
pub fn spawn_worker(config: &SpawnConfig) -> Result<WorkerProcess> {
    let mut cmd = Command::new(&config.shell);
    cmd.arg(&config.script)
        .envs(&config.envs)
        .current_dir(&config.cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| AppError::spawn(&err))?;

    let stdin = child.stdin.take().ok_or_else(|| pipe_error("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| pipe_error("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| pipe_error("stderr"))?;

    info!(
        shell = %config.shell.display(),
        script = %config.script.display(),
        pid = ?child.id(),
        "worker process spawned"
    );

    Ok(WorkerProcess {
        child,
        stdin,
        stdout,
        stderr,
    })
}

fn pipe_error(pipe: &str) -> AppError {
    AppError::Spawn {
        kind: crate::SpawnErrorKind::Other,
        message: format!("failed to capture worker {pipe}"),
    }
}

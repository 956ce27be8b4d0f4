//! Exit monitor for the worker process.
//!
//! Races the child's exit against the worker's shutdown token. On exit the
//! pump gets a short grace period to deliver what the process wrote before
//! it went away; disposal itself is idempotent, so whichever of the two
//! disposes first decides the reason.

use std::process::ExitStatus;
use std::sync::Arc;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::reader::PIPE_DRAIN_GRACE;
use super::state::{DisposeReason, Shared};

/// Spawn the task that owns `child` until the worker terminates.
///
/// - Child exits first: once `pump` finishes (or the grace period runs out)
///   the worker is disposed with the exit status, reported as an unexpected
///   termination unless the pump already disposed it.
/// - Shutdown fires first: the worker is disposed as cancelled (a no-op if
///   someone else already disposed it) and the child is killed. A child that
///   already exited is not an error.
pub(crate) fn monitor_exit(
    shared: Arc<Shared>,
    mut child: Child,
    mut pump: JoinHandle<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = child.wait() => {
                let reason = match result {
                    Ok(status) => describe_exit(status),
                    Err(err) => {
                        warn!(worker = %shared.name, %err, "error waiting for worker process");
                        format!("wait error: {err}")
                    }
                };
                if tokio::time::timeout(PIPE_DRAIN_GRACE, &mut pump).await.is_err() {
                    debug!(worker = %shared.name, "pump still running after exit");
                }
                shared.dispose(DisposeReason::Exited(reason)).await;
            }
            () = shared.shutdown.cancelled() => {
                shared.dispose(DisposeReason::Cancelled).await;
                match child.kill().await {
                    Ok(()) => debug!(worker = %shared.name, "worker process killed"),
                    Err(err) => debug!(worker = %shared.name, %err, "kill skipped: worker already exited"),
                }
            }
        }
    })
}

fn describe_exit(status: ExitStatus) -> String {
    status.code().map_or_else(
        || "process terminated by signal".to_owned(),
        |c| format!("process exited with code {c}"),
    )
}

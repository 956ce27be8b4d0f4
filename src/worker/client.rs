//! Request side of a completion worker.

use std::sync::Arc;

use futures_util::SinkExt;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec::WorkerCodec;
use super::lifecycle::monitor_exit;
use super::reader::run_pump;
use super::spawner::{spawn_worker, SpawnConfig, WorkerProcess};
use super::state::{DisposeReason, Lane, Shared, WorkerPhase};
use crate::diagnostics::DiagnosticSink;
use crate::{AppError, Result};

/// A persistent shell process answering completion queries.
///
/// Queries are strictly single-flight: a second [`request`](Self::request)
/// waits until the first one resolves, so each response contains exactly
/// the stdout lines emitted between its own query and the next sentinel.
/// Waiters are served in the order they called `request`.
///
/// Every failure path resolves to an empty response. Problems are reported
/// once through the [`DiagnosticSink`]; after disposal the worker answers
/// every request with `[]` silently.
///
/// Dropping the worker cancels it and kills the process.
pub struct ShellWorker {
    shared: Arc<Shared>,
}

impl ShellWorker {
    /// Create an uninitialized worker.
    ///
    /// `name` tags every diagnostic. Cancelling `cancel` disposes the worker
    /// silently.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sink: Arc<dyn DiagnosticSink>,
        cancel: &CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(name.into(), sink, cancel.child_token())),
        }
    }

    /// Identifying name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Launch the process and start the pump and exit monitor.
    ///
    /// A spawn failure is reported through the sink and terminates the
    /// worker. There is no retry.
    ///
    /// # Errors
    ///
    /// - `AppError::Spawn` if the process cannot be launched.
    /// - `AppError::Protocol` if the worker was already started.
    /// - `AppError::Cancelled` if the worker was cancelled during launch.
    pub async fn start(&self, config: &SpawnConfig) -> Result<()> {
        if !self.shared.begin_spawn().await {
            return Err(AppError::Protocol("worker already started".into()));
        }

        let WorkerProcess {
            child,
            stdin,
            stdout,
            stderr,
        } = match spawn_worker(config) {
            Ok(process) => process,
            Err(err) => {
                self.shared.abort(&err).await;
                return Err(err);
            }
        };

        let writer = FramedWrite::new(stdin, WorkerCodec::new());
        if !self.shared.finish_spawn(writer, child.id()).await {
            // Cancelled mid-launch; dropping `child` kills it.
            return Err(AppError::Cancelled);
        }

        let pump = tokio::spawn(run_pump(Arc::clone(&self.shared), stdout, stderr));
        drop(monitor_exit(Arc::clone(&self.shared), child, pump));
        Ok(())
    }

    /// Terminate a worker that could not be prepared (bad configuration,
    /// missing capture script) and report `err` once.
    pub async fn abort(&self, err: &AppError) {
        self.shared.abort(err).await;
    }

    /// Send one query line and wait for its candidate lines.
    ///
    /// Returns `[]` without touching the process when the worker is not
    /// running. Cancelling `cancel` while waiting disposes the worker
    /// silently and returns `[]`. There is no timeout: a shell that never
    /// emits the sentinel keeps the caller waiting until cancellation or exit.
    ///
    /// Dropping the returned future does not dispose the worker. The
    /// abandoned query's response is still owed; the next request waits for
    /// its sentinel and discards those lines before writing its own query.
    pub async fn request(&self, query: &str, cancel: &CancellationToken) -> Vec<String> {
        let Some(lane) = self.shared.lane().await else {
            return Vec::new();
        };

        if query.contains(['\n', '\r']) {
            warn!(worker = %self.shared.name, "multi-line query rejected");
            return Vec::new();
        }

        // Held until this query's response resolves.
        let mut lane = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.shared.dispose(DisposeReason::Cancelled).await;
                return Vec::new();
            }
            guard = lane.lock() => guard,
        };

        if lane.owed.is_some() && !self.discard_owed(&mut lane, cancel).await {
            return Vec::new();
        }

        let Some(response) = self.shared.install_pending().await else {
            return Vec::new();
        };
        lane.owed = Some(response);

        debug!(worker = %self.shared.name, query, "sending query");
        if let Err(err) = lane.writer.send(query.to_owned()).await {
            warn!(worker = %self.shared.name, error = %err, "write to worker stdin failed");
            self.shared
                .dispose(DisposeReason::WriteFailed(err.to_string()))
                .await;
            return Vec::new();
        }

        self.await_owed(&mut lane, cancel).await.unwrap_or_default()
    }

    /// Wait for the response in `lane.owed` and clear it.
    ///
    /// `None` if the worker was cancelled or disposed while waiting.
    async fn await_owed(
        &self,
        lane: &mut Lane,
        cancel: &CancellationToken,
    ) -> Option<Vec<String>> {
        let response = lane.owed.as_mut()?;
        let lines = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.shared.dispose(DisposeReason::Cancelled).await;
                return None;
            }
            lines = response => lines.ok(),
        };
        lane.owed = None;
        lines
    }

    /// Finish the response of a request that was dropped mid-flight.
    ///
    /// Returns `false` if the worker is gone.
    async fn discard_owed(&self, lane: &mut Lane, cancel: &CancellationToken) -> bool {
        // A dropped send may have left the query in the write buffer.
        if let Err(err) = SinkExt::<String>::flush(&mut lane.writer).await {
            warn!(worker = %self.shared.name, error = %err, "flush to worker stdin failed");
            self.shared
                .dispose(DisposeReason::WriteFailed(err.to_string()))
                .await;
            return false;
        }

        match self.await_owed(lane, cancel).await {
            Some(lines) => {
                debug!(
                    worker = %self.shared.name,
                    lines = lines.len(),
                    "discarded response of abandoned request"
                );
                true
            }
            None => false,
        }
    }

    /// Dispose the worker silently. Safe to call more than once.
    pub async fn cancel(&self) {
        self.shared.dispose(DisposeReason::Cancelled).await;
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> WorkerPhase {
        self.shared.phase().await
    }

    /// Whether the worker currently accepts queries.
    pub async fn is_alive(&self) -> bool {
        self.phase().await == WorkerPhase::Running
    }

    /// OS process id while running.
    pub async fn pid(&self) -> Option<u32> {
        self.shared.pid().await
    }
}

impl Drop for ShellWorker {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

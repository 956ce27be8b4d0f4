//! Worker state machine shared by the request path, the stream pump, and the
//! lifecycle monitor.
//!
//! `Uninitialized → Spawning → Running → Terminated`. Nothing leaves
//! `Terminated`; a fresh initialization builds a new worker instead.
//!
//! All transitions happen under one short-lived lock. No `.await` is held
//! across the lock except the lock acquisition itself.

use std::sync::Arc;

use tokio::process::ChildStdin;
use tokio::sync::{oneshot, Mutex};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::WorkerCodec;
use super::reader::OutputBuffer;
use crate::diagnostics::DiagnosticSink;
use crate::AppError;

/// Message reported when the worker goes away on its own.
pub const TERMINATED_MESSAGE: &str = "worker process terminated";

/// Framed writer over the worker's stdin.
pub(crate) type Writer = FramedWrite<ChildStdin, WorkerCodec>;

/// Observable phase of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Created, nothing launched yet.
    Uninitialized,
    /// Process launch in progress.
    Spawning,
    /// Process alive and accepting queries.
    Running,
    /// Disposed; every request resolves empty.
    Terminated,
}

pub(crate) enum WorkerState {
    Uninitialized,
    Spawning,
    Running(Running),
    Terminated,
}

/// Request side of a running worker. Holding its lock is what makes a
/// request "in flight".
pub(crate) struct Lane {
    pub(crate) writer: Writer,
    /// Response of the last query written. It stays here when the request
    /// that wrote the query is dropped before the sentinel, so the next
    /// request waits it out instead of receiving those lines.
    pub(crate) owed: Option<oneshot::Receiver<Vec<String>>>,
}

/// Live handles of a running worker.
pub(crate) struct Running {
    lane: Arc<Mutex<Lane>>,
    /// Resolver of the outstanding request, if any.
    pending: Option<oneshot::Sender<Vec<String>>>,
    /// Stdout lines of the outstanding request. Only filled while `pending`
    /// is set.
    buffer: OutputBuffer,
    pid: Option<u32>,
}

/// What triggered a disposal.
#[derive(Debug)]
pub(crate) enum DisposeReason {
    /// The process exited (status text attached).
    Exited(String),
    /// One of the output pipes reached EOF.
    StreamClosed(&'static str),
    /// Reading an output pipe failed.
    StreamFailed(String),
    /// Writing a query to stdin failed.
    WriteFailed(String),
    /// Host-initiated cancellation or drop.
    Cancelled,
}

impl std::fmt::Display for DisposeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(status) => write!(f, "exited: {status}"),
            Self::StreamClosed(pipe) => write!(f, "{pipe} closed"),
            Self::StreamFailed(err) => write!(f, "read failed: {err}"),
            Self::WriteFailed(err) => write!(f, "write failed: {err}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl DisposeReason {
    fn is_reportable(&self, had_pending: bool) -> bool {
        match self {
            Self::Cancelled => false,
            Self::StreamClosed(_) => had_pending,
            Self::Exited(_) | Self::StreamFailed(_) | Self::WriteFailed(_) => true,
        }
    }
}

pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) shutdown: CancellationToken,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
    state: Mutex<WorkerState>,
}

impl Shared {
    pub(crate) fn new(
        name: String,
        sink: Arc<dyn DiagnosticSink>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            name,
            shutdown,
            sink,
            state: Mutex::new(WorkerState::Uninitialized),
        }
    }

    pub(crate) async fn phase(&self) -> WorkerPhase {
        match &*self.state.lock().await {
            WorkerState::Uninitialized => WorkerPhase::Uninitialized,
            WorkerState::Spawning => WorkerPhase::Spawning,
            WorkerState::Running(_) => WorkerPhase::Running,
            WorkerState::Terminated => WorkerPhase::Terminated,
        }
    }

    pub(crate) async fn pid(&self) -> Option<u32> {
        match &*self.state.lock().await {
            WorkerState::Running(running) => running.pid,
            _ => None,
        }
    }

    /// `Uninitialized → Spawning`. Returns `false` from any other state.
    pub(crate) async fn begin_spawn(&self) -> bool {
        let mut state = self.state.lock().await;
        if matches!(*state, WorkerState::Uninitialized) {
            *state = WorkerState::Spawning;
            true
        } else {
            false
        }
    }

    /// `Spawning → Running`. Returns `false` if the worker was cancelled
    /// while the process was being launched.
    pub(crate) async fn finish_spawn(&self, writer: Writer, pid: Option<u32>) -> bool {
        let mut state = self.state.lock().await;
        if !matches!(*state, WorkerState::Spawning) {
            return false;
        }
        *state = WorkerState::Running(Running {
            lane: Arc::new(Mutex::new(Lane {
                writer,
                owed: None,
            })),
            pending: None,
            buffer: OutputBuffer::new(),
            pid,
        });
        true
    }

    /// Move a worker that never reached `Running` to `Terminated` and report
    /// `err` once. A running or already terminated worker is left alone.
    pub(crate) async fn abort(&self, err: &AppError) {
        {
            let mut state = self.state.lock().await;
            if !matches!(*state, WorkerState::Uninitialized | WorkerState::Spawning) {
                return;
            }
            *state = WorkerState::Terminated;
        }
        self.shutdown.cancel();

        info!(worker = %self.name, error = %err, "worker failed to start");
        if err.is_reportable() {
            self.sink.report(&self.name, &err.to_string());
        }
    }

    pub(crate) async fn lane(&self) -> Option<Arc<Mutex<Lane>>> {
        match &*self.state.lock().await {
            WorkerState::Running(running) => Some(Arc::clone(&running.lane)),
            _ => None,
        }
    }

    /// Create the resolver for the request about to be written.
    ///
    /// Returns `None` if the worker was disposed in the meantime.
    pub(crate) async fn install_pending(&self) -> Option<oneshot::Receiver<Vec<String>>> {
        let mut state = self.state.lock().await;
        let WorkerState::Running(running) = &mut *state else {
            return None;
        };
        let (tx, rx) = oneshot::channel();
        if running.pending.replace(tx).is_some() {
            warn!(worker = %self.name, "pending request replaced before its sentinel");
        }
        let stale = running.buffer.drain();
        if !stale.is_empty() {
            debug!(worker = %self.name, lines = stale.len(), "discarding stray stdout lines");
        }
        Some(rx)
    }

    /// Buffer one stdout line for the outstanding request.
    ///
    /// Lines that arrive while no request is outstanding belong to no
    /// response and are dropped.
    pub(crate) async fn collect(&self, line: String) {
        let mut state = self.state.lock().await;
        match &mut *state {
            WorkerState::Running(running) if running.pending.is_some() => {
                running.buffer.push(line);
            }
            _ => debug!(worker = %self.name, %line, "stdout outside a request, dropping"),
        }
    }

    /// Hand the buffered lines to the outstanding request.
    ///
    /// Without an outstanding request nothing is buffered and the sentinel
    /// is ignored.
    pub(crate) async fn resolve_pending(&self) {
        let (sender, lines) = match &mut *self.state.lock().await {
            WorkerState::Running(running) => (running.pending.take(), running.buffer.drain()),
            _ => (None, Vec::new()),
        };

        match sender {
            Some(tx) => {
                debug!(worker = %self.name, lines = lines.len(), "response complete");
                if tx.send(lines).is_err() {
                    debug!(worker = %self.name, "requester gone before response arrived");
                }
            }
            None => {
                debug!(
                    worker = %self.name,
                    lines = lines.len(),
                    "sentinel without pending request, discarding"
                );
            }
        }
    }

    /// Terminate the worker. Idempotent: only the first call has effects.
    ///
    /// Resolves any outstanding request with an empty response, signals the
    /// lifecycle monitor to kill the process, and reports
    /// [`TERMINATED_MESSAGE`] unless the disposal was a cancellation or a
    /// quiet EOF between requests.
    pub(crate) async fn dispose(&self, reason: DisposeReason) {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, WorkerState::Terminated)
        };
        self.shutdown.cancel();

        let WorkerState::Running(running) = previous else {
            debug!(worker = %self.name, %reason, "dispose: worker not running");
            return;
        };

        let had_pending = running.pending.is_some();
        info!(
            worker = %self.name,
            pid = ?running.pid,
            %reason,
            had_pending,
            "worker disposed"
        );

        // Report before waking the requester so it observes the diagnostic.
        if reason.is_reportable(had_pending) {
            self.sink.report(&self.name, TERMINATED_MESSAGE);
        }
        if let Some(tx) = running.pending {
            let _ = tx.send(Vec::new());
        }
    }
}

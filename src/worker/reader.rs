//! Stream pump: output collection and sentinel detection.
//!
//! One task owns both output pipes of a worker:
//!
//! | Pipe   | Line                  | Effect                                          |
//! |--------|-----------------------|-------------------------------------------------|
//! | stdout | *(any)*               | buffered for the pending request, else dropped  |
//! | stderr | [`SENTINEL`]          | buffer drained into the pending request         |
//! | stderr | *(anything else)*     | reported as a diagnostic, tagged by worker      |
//!
//! The `select!` is biased towards stdout, so every candidate line that is
//! already readable when the sentinel arrives lands in the buffer first.
//! Neither pipe waits on the other: a quiet stdout never delays stderr.
//!
//! EOF or a read error on either pipe disposes the worker. After stdout
//! closes, stderr is still read to its end (for a short grace period)
//! so a process that answers and then exits completes its last response.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use super::codec::WorkerCodec;
use super::state::{DisposeReason, Shared};

/// Marker line on stderr that ends one response.
pub const SENTINEL: &str = "EOF";

/// Ordered candidate lines collected since the last sentinel.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    lines: Vec<String>,
}

impl OutputBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line as received.
    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Take every buffered line, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    /// Number of buffered lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Meaning of one stderr line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrLine<'a> {
    /// The response terminator.
    Sentinel,
    /// Free text to surface to the host.
    Diagnostic(&'a str),
}

/// Classify a stderr line. Only an exact match is a sentinel.
#[must_use]
pub fn classify(line: &str) -> StderrLine<'_> {
    if line == SENTINEL {
        StderrLine::Sentinel
    } else {
        StderrLine::Diagnostic(line)
    }
}

/// How long stderr may stay open after stdout closed, and how long the exit
/// monitor waits for the pump once the process is gone.
pub(crate) const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Drive both output pipes until shutdown, EOF, or a read failure.
pub(crate) async fn run_pump<O, E>(shared: Arc<Shared>, stdout: O, stderr: E)
where
    O: AsyncRead + Unpin + Send,
    E: AsyncRead + Unpin + Send,
{
    let mut stdout = FramedRead::new(stdout, WorkerCodec::new());
    let mut stderr = FramedRead::new(stderr, WorkerCodec::new());

    let reason = loop {
        tokio::select! {
            biased;

            () = shared.shutdown.cancelled() => {
                debug!(worker = %shared.name, "pump: shutdown received, stopping");
                return;
            }

            item = stdout.next() => match item {
                Some(Ok(line)) => shared.collect(line).await,
                Some(Err(e)) => {
                    warn!(worker = %shared.name, error = %e, "pump: stdout read failed");
                    break DisposeReason::StreamFailed(format!("stdout: {e}"));
                }
                None => {
                    debug!(worker = %shared.name, "pump: stdout EOF, draining stderr");
                    match timeout(PIPE_DRAIN_GRACE, drain_stderr(&shared, &mut stderr)).await {
                        Ok(Some(reason)) => break reason,
                        Ok(None) => return,
                        Err(_) => break DisposeReason::StreamClosed("stdout"),
                    }
                }
            },

            item = stderr.next() => match item {
                Some(Ok(line)) => on_stderr_line(&shared, &line).await,
                Some(Err(e)) => {
                    warn!(worker = %shared.name, error = %e, "pump: stderr read failed");
                    break DisposeReason::StreamFailed(format!("stderr: {e}"));
                }
                None => {
                    debug!(worker = %shared.name, "pump: stderr EOF");
                    break DisposeReason::StreamClosed("stderr");
                }
            },
        }
    };

    shared.dispose(reason).await;
}

async fn on_stderr_line(shared: &Shared, line: &str) {
    match classify(line) {
        StderrLine::Sentinel => shared.resolve_pending().await,
        StderrLine::Diagnostic(message) => shared.sink.report(&shared.name, message),
    }
}

/// Consume stderr after stdout closed, so a sentinel the process wrote
/// before exiting still completes its response. `None` on shutdown.
async fn drain_stderr<E>(
    shared: &Shared,
    stderr: &mut FramedRead<E, WorkerCodec>,
) -> Option<DisposeReason>
where
    E: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            biased;

            () = shared.shutdown.cancelled() => return None,

            item = stderr.next() => match item {
                Some(Ok(line)) => on_stderr_line(shared, &line).await,
                Some(Err(e)) => {
                    warn!(worker = %shared.name, error = %e, "pump: stderr read failed");
                    return Some(DisposeReason::StreamFailed(format!("stderr: {e}")));
                }
                None => return Some(DisposeReason::StreamClosed("stdout")),
            },
        }
    }
}

//! Diagnostic channel towards the host's error display.
//!
//! Every user-visible problem (bad configuration, missing capture script,
//! spawn failure, unexpected worker exit, free-text lines the shell writes to
//! stderr) is delivered as one text message tagged with the name of the
//! worker that produced it.

use tokio::sync::mpsc;
use tracing::error;

/// A single message forwarded to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Identifying name of the reporting worker (the configured shell).
    pub source: String,
    /// Message text.
    pub message: String,
}

/// Receiver of diagnostics.
///
/// Implementations must not block: reports are emitted from inside the
/// stream pump and the lifecycle monitor.
pub trait DiagnosticSink: Send + Sync {
    /// Deliver one message tagged with `source`.
    fn report(&self, source: &str, message: &str);
}

/// Sink that writes every diagnostic to the `tracing` log at `ERROR`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, source: &str, message: &str) {
        error!(source, message, "shell-native");
    }
}

/// Sink that forwards diagnostics into an unbounded channel.
///
/// A closed receiver is ignored; the host has stopped listening.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Diagnostic>,
}

impl ChannelSink {
    /// Create a sink together with the receiver the host drains.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Diagnostic>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DiagnosticSink for ChannelSink {
    fn report(&self, source: &str, message: &str) {
        let _ = self.tx.send(Diagnostic {
            source: source.to_owned(),
            message: message.to_owned(),
        });
    }
}

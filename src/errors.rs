//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Why a worker process could not be launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnErrorKind {
    /// The shell executable could not be located.
    NotFound,
    /// Any other launch failure (permissions, resource limits, ...).
    Other,
}

/// Error enumeration covering every failure mode of a completion worker.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or missing `shell` / `envs` configuration.
    Config(String),
    /// No capture script exists for the configured shell on the runtimepath.
    ScriptNotFound(String),
    /// The worker process could not be launched.
    Spawn {
        /// Failure class.
        kind: SpawnErrorKind,
        /// Human-readable detail from the OS.
        message: String,
    },
    /// The worker terminated or broke its stream contract mid-request.
    Protocol(String),
    /// The host cancelled the worker. Never shown to the user.
    Cancelled,
    /// A single line could not be framed (too long or not UTF-8).
    Framing(String),
    /// Pipe or file-system I/O failure.
    Io(String),
}

impl AppError {
    /// Build a spawn error from the OS error returned by `Command::spawn`.
    #[must_use]
    pub fn spawn(err: &std::io::Error) -> Self {
        let kind = if err.kind() == std::io::ErrorKind::NotFound {
            SpawnErrorKind::NotFound
        } else {
            SpawnErrorKind::Other
        };
        Self::Spawn {
            kind,
            message: err.to_string(),
        }
    }

    /// Whether this error belongs on the host's diagnostic channel.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::ScriptNotFound(msg) => write!(f, "script not found: {msg}"),
            Self::Spawn {
                kind: SpawnErrorKind::NotFound,
                message,
            } => write!(f, "spawn: executable not found: {message}"),
            Self::Spawn {
                kind: SpawnErrorKind::Other,
                message,
            } => write!(f, "spawn: {message}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Framing(msg) => write!(f, "framing: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#![forbid(unsafe_code)]

//! Shell-native completion for editors.
//!
//! Completion candidates are computed by a real shell: a long-lived worker
//! process runs a small capture script, receives one query line per request
//! on stdin, prints candidates on stdout, and ends each response with an
//! `EOF` line on stderr.

pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod source;
pub mod worker;

pub use config::{GlobalConfig, SourceParams};
pub use errors::{AppError, Result, SpawnErrorKind};
pub use source::{ShellNativeSource, SourceEnv};
pub use worker::ShellWorker;

//! Source parameters, global configuration, and capture-script lookup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::{AppError, Result};

/// Per-source parameters supplied by the host.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SourceParams {
    /// Shell executable name or path (e.g. `zsh`, `/usr/bin/fish`).
    #[serde(default)]
    pub shell: String,
    /// Extra environment variables for the worker; these win over inherited ones.
    #[serde(default)]
    pub envs: HashMap<String, String>,
}

impl SourceParams {
    /// Final path component of `shell`, used to pick the capture script and
    /// the output dialect.
    #[must_use]
    pub fn shell_name(&self) -> &str {
        shell_name(&self.shell)
    }

    /// Validate the parameters and resolve the shell executable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `shell` is empty or not an installed
    /// executable, or if any `envs` entry cannot be passed to a process.
    pub fn validate(&self) -> Result<PathBuf> {
        if self.shell.trim().is_empty() {
            return Err(AppError::Config("shell must not be empty".into()));
        }

        for (key, value) in &self.envs {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(AppError::Config(format!(
                    "envs key {key:?} is not a valid variable name"
                )));
            }
            if value.contains('\0') {
                return Err(AppError::Config(format!(
                    "envs value for {key} contains a NUL byte"
                )));
            }
        }

        which::which(&self.shell).map_err(|err| {
            AppError::Config(format!("shell {:?} is not executable: {err}", self.shell))
        })
    }
}

/// Final path component of a shell path; the input itself if it has none.
#[must_use]
pub fn shell_name(shell: &str) -> &str {
    Path::new(shell)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(shell)
}

/// Configuration file for the `shell-native` binary.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Worker parameters.
    #[serde(default)]
    pub source: SourceParams,
    /// Directories searched, in order, for `bin/capture.<shell>`.
    #[serde(default)]
    pub runtimepath: Vec<PathBuf>,
    /// Working directory of the worker; the current directory when unset.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// Source parameters are validated later, when the source starts, so
    /// that the failure is reported through the diagnostic channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing fails or `runtimepath` is empty.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        if config.runtimepath.is_empty() {
            return Err(AppError::Config("runtimepath must not be empty".into()));
        }
        Ok(config)
    }

    /// Working directory for the worker.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no `cwd` is configured and the current
    /// directory cannot be determined.
    pub fn resolve_cwd(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => std::env::current_dir()
                .map_err(|err| AppError::Config(format!("cannot determine cwd: {err}"))),
        }
    }
}

/// Locate `bin/capture.<shell_name>` in the first runtimepath entry that has it.
///
/// # Errors
///
/// Returns `AppError::ScriptNotFound` when no directory contains the script.
pub fn find_capture_script(runtimepath: &[PathBuf], shell_name: &str) -> Result<PathBuf> {
    let file = format!("capture.{}", glob::Pattern::escape(shell_name));

    for dir in runtimepath {
        let base = glob::Pattern::escape(&dir.to_string_lossy());
        let pattern = format!("{base}/bin/{file}");
        let Ok(entries) = glob::glob(&pattern) else {
            debug!(%pattern, "capture lookup: invalid pattern, skipping");
            continue;
        };
        if let Some(path) = entries.filter_map(std::result::Result::ok).next() {
            debug!(path = %path.display(), "capture lookup: found script");
            return Ok(path);
        }
    }

    Err(AppError::ScriptNotFound(format!(
        "no bin/capture.{shell_name} in runtimepath"
    )))
}

//! Completion source: configuration, worker, and post-processing together.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::completion::{
    complete_position, post_process, CompletionContext, CompletionItem, Dialect,
};
use crate::config::{find_capture_script, SourceParams};
use crate::diagnostics::DiagnosticSink;
use crate::worker::spawner::SpawnConfig;
use crate::worker::ShellWorker;
use crate::Result;

/// Host-side environment of a source.
#[derive(Debug, Clone)]
pub struct SourceEnv {
    /// Directories searched for `bin/capture.<shell>`.
    pub runtimepath: Vec<PathBuf>,
    /// Working directory of the worker.
    pub cwd: PathBuf,
}

/// A shell-native completion source backed by one worker.
pub struct ShellNativeSource {
    worker: ShellWorker,
    dialect: Dialect,
}

impl ShellNativeSource {
    /// Validate `params`, locate the capture script, and start the worker.
    ///
    /// Never fails: configuration, lookup, and spawn errors are reported once
    /// through `sink` and leave a terminated worker that answers `[]`.
    pub async fn init(
        params: &SourceParams,
        env: &SourceEnv,
        sink: Arc<dyn DiagnosticSink>,
        cancel: &CancellationToken,
    ) -> Self {
        let name = match params.shell_name() {
            "" => "shell-native",
            name => name,
        };
        let worker = ShellWorker::new(name, sink, cancel);

        match prepare(params, env) {
            Ok(config) => {
                if let Err(err) = worker.start(&config).await {
                    debug!(worker = name, %err, "source started without a live worker");
                }
            }
            Err(err) => worker.abort(&err).await,
        }

        Self {
            worker,
            dialect: Dialect::for_shell(&params.shell),
        }
    }

    /// Start of the word under completion in `input`.
    #[must_use]
    pub fn complete_position(input: &str) -> usize {
        complete_position(input)
    }

    /// Ask the worker for candidates for `ctx`.
    pub async fn gather(
        &self,
        ctx: &CompletionContext,
        cancel: &CancellationToken,
    ) -> Vec<CompletionItem> {
        let lines = self.worker.request(ctx.query(), cancel).await;
        post_process(&lines, self.dialect)
    }

    /// Dispose the worker silently.
    pub async fn cancel(&self) {
        self.worker.cancel().await;
    }

    /// Underlying worker.
    #[must_use]
    pub fn worker(&self) -> &ShellWorker {
        &self.worker
    }

    /// Output dialect of the configured shell.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

fn prepare(params: &SourceParams, env: &SourceEnv) -> Result<SpawnConfig> {
    let shell = params.validate()?;
    let script = find_capture_script(&env.runtimepath, params.shell_name())?;
    Ok(SpawnConfig {
        shell,
        script,
        cwd: env.cwd.clone(),
        envs: params.envs.clone(),
    })
}

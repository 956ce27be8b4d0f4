#![forbid(unsafe_code)]

//! `shell-native`: answer completion queries from stdin with a shell worker.
//!
//! Reads one query per line, prints the candidates (one per line, `word` or
//! `word<TAB>info`, or JSON objects with `--json`), then an empty line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use shell_native::completion::{CompletionContext, CompletionItem, EditorMode};
use shell_native::diagnostics::TracingSink;
use shell_native::worker::codec::WorkerCodec;
use shell_native::{AppError, GlobalConfig, Result, ShellNativeSource, SourceEnv};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "shell-native", about = "Shell-native completion worker", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Print candidates as JSON objects.
    #[arg(long)]
    json: bool,

    /// Treat queries as editor command-line input (`!cmd`).
    #[arg(long)]
    cmdline: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = GlobalConfig::load_from_path(&args.config)?;
    let env = SourceEnv {
        runtimepath: config.runtimepath.clone(),
        cwd: config.resolve_cwd()?,
    };

    let ct = CancellationToken::new();
    let source = ShellNativeSource::init(&config.source, &env, Arc::new(TracingSink), &ct).await;
    info!(shell = %config.source.shell, "source initialized");

    let signal_ct = ct.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    let mode = if args.cmdline {
        EditorMode::CommandLine
    } else {
        EditorMode::Insert
    };
    let mut queries = FramedRead::new(tokio::io::stdin(), WorkerCodec::new());
    let mut out = tokio::io::stdout();

    loop {
        let query = tokio::select! {
            biased;
            () = ct.cancelled() => break,
            next = queries.next() => match next {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    error!(%err, "failed to read query");
                    break;
                }
                None => break,
            },
        };

        let ctx = CompletionContext::new(query, mode);
        let items = source.gather(&ctx, &ct).await;
        out.write_all(render(&items, args.json)?.as_bytes()).await?;
        out.flush().await?;
    }

    source.cancel().await;
    info!("shell-native shut down");
    Ok(())
}

fn render(items: &[CompletionItem], json: bool) -> Result<String> {
    let mut rendered = String::new();
    for item in items {
        if json {
            let line = serde_json::to_string(item)
                .map_err(|err| AppError::Io(format!("failed to encode candidate: {err}")))?;
            rendered.push_str(&line);
        } else {
            rendered.push_str(&item.word);
            if let Some(info) = &item.info {
                rendered.push('\t');
                rendered.push_str(info);
            }
        }
        rendered.push('\n');
    }
    rendered.push('\n');
    Ok(rendered)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}

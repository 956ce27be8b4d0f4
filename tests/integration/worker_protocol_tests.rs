//! Request/response pairing against a real `sh` worker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use shell_native::completion::{post_process, CompletionItem, Dialect};
use shell_native::diagnostics::{ChannelSink, Diagnostic};
use shell_native::ShellWorker;

use super::fixtures::{
    runtime_dir, settle_diagnostics, spawn_config, start_worker, start_worker_with, BANNER_SCRIPT,
};

#[tokio::test]
async fn response_contains_lines_before_sentinel() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    let lines = h.worker.request("ls /tmp/", &ct).await;
    assert_eq!(lines, vec!["file1\tinfo1".to_owned(), "file2".to_owned()]);

    assert_eq!(
        post_process(&lines, Dialect::Fish),
        vec![
            CompletionItem::with_info("file1", "info1"),
            CompletionItem::word("file2"),
        ]
    );
}

#[tokio::test]
async fn sequential_requests_do_not_bleed() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    assert_eq!(h.worker.request("alpha", &ct).await, vec!["alpha".to_owned()]);
    assert_eq!(h.worker.request("ls /tmp/", &ct).await.len(), 2);
    assert_eq!(h.worker.request("beta", &ct).await, vec!["beta".to_owned()]);
}

/// Both queries are issued without waiting; each gets only its own lines.
#[tokio::test]
async fn back_to_back_requests_resolve_in_order() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    let (first, second) = tokio::join!(
        h.worker.request("first", &ct),
        h.worker.request("second", &ct)
    );

    assert_eq!(first, vec!["first".to_owned()]);
    assert_eq!(second, vec!["second".to_owned()]);
}

#[tokio::test]
async fn many_concurrent_requests_each_get_their_own_lines() {
    let h = start_worker().await;
    let ct = CancellationToken::new();
    let queries: Vec<String> = (0..16).map(|i| format!("query-{i}")).collect();

    let results = join_all(queries.iter().map(|q| h.worker.request(q, &ct))).await;

    for (query, lines) in queries.iter().zip(results) {
        assert_eq!(lines, vec![query.clone()]);
    }
}

#[tokio::test]
async fn empty_response_resolves_empty() {
    let mut h = start_worker().await;
    let ct = CancellationToken::new();

    let lines = h.worker.request("warn", &ct).await;
    assert!(lines.is_empty());

    let diagnostics = settle_diagnostics(&mut h.diagnostics).await;
    assert_eq!(
        diagnostics,
        vec![Diagnostic {
            source: "sh".to_owned(),
            message: "capture: something odd".to_owned(),
        }]
    );
    assert!(h.worker.is_alive().await, "diagnostics must not dispose the worker");
}

#[tokio::test]
async fn trailing_double_slash_survives_transport() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    let lines = h.worker.request("dir", &ct).await;
    assert_eq!(lines, vec!["dir//".to_owned()]);
    assert_eq!(post_process(&lines, Dialect::Plain)[0].word, "dir/");
}

#[tokio::test]
async fn multi_line_query_is_rejected_without_writing() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    assert!(h.worker.request("a\nb", &ct).await.is_empty());
    assert_eq!(h.worker.request("c", &ct).await, vec!["c".to_owned()]);
}

#[tokio::test]
async fn env_overrides_reach_the_worker() {
    let dir = runtime_dir();
    let mut config = spawn_config(&dir);
    config.envs = HashMap::from([("SHELL_NATIVE_TEST".to_owned(), "override".to_owned())]);

    let (sink, _rx) = ChannelSink::new();
    let worker = ShellWorker::new("sh", Arc::new(sink), &CancellationToken::new());
    worker.start(&config).await.expect("start");

    let ct = CancellationToken::new();
    assert_eq!(worker.request("env", &ct).await, vec!["override".to_owned()]);
}

#[tokio::test]
async fn inherited_environment_is_kept() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    let lines = h.worker.request("path", &ct).await;
    assert_eq!(lines, vec![std::env::var("PATH").expect("PATH set")]);
}

#[tokio::test]
async fn worker_runs_in_configured_cwd() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    let lines = h.worker.request("pwd", &ct).await;
    let expected = h.dir.path().canonicalize().expect("canonical tempdir");
    assert_eq!(
        std::path::Path::new(&lines[0]).canonicalize().expect("canonical pwd"),
        expected
    );
}

#[tokio::test]
async fn worker_reports_pid_while_running() {
    let h = start_worker().await;
    assert!(h.worker.pid().await.is_some());
    assert_eq!(h.worker.name(), "sh");
}

// ── Abandoned requests ───────────────────────────────────────────────────────

/// A request dropped by a timeout still owes its response; the next request
/// must not receive those lines.
#[tokio::test]
async fn timed_out_request_does_not_leak_into_the_next() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), h.worker.request("slow", &ct)).await;
    assert!(abandoned.is_err(), "slow query must still be running");

    assert_eq!(h.worker.request("second", &ct).await, vec!["second".to_owned()]);
    assert!(h.worker.is_alive().await, "dropping a request keeps the worker");
}

#[tokio::test]
async fn requests_queued_after_a_dropped_one_stay_paired() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    tokio::select! {
        _ = h.worker.request("slow", &ct) => panic!("slow query answered too early"),
        () = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    let (a, b) = tokio::join!(h.worker.request("a", &ct), h.worker.request("b", &ct));
    assert_eq!(a, vec!["a".to_owned()]);
    assert_eq!(b, vec!["b".to_owned()]);
}

// ── Output outside a request ─────────────────────────────────────────────────

#[tokio::test]
async fn startup_banner_is_not_part_of_the_first_response() {
    let mut h = start_worker_with(BANNER_SCRIPT).await;
    let ct = CancellationToken::new();

    // `ready` follows the banner, so the banner has been read by now.
    let ready = h.diagnostics.recv().await.expect("ready diagnostic");
    assert_eq!(ready.message, "ready");

    assert_eq!(h.worker.request("a", &ct).await, vec!["a".to_owned()]);
}

#[tokio::test]
async fn stdout_after_the_sentinel_is_dropped() {
    let h = start_worker().await;
    let ct = CancellationToken::new();

    assert_eq!(h.worker.request("stray", &ct).await, vec!["stray".to_owned()]);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(h.worker.request("b", &ct).await, vec!["b".to_owned()]);
}

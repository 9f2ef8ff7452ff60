/*
[INPUT]:  Local shell commands registered with CommandRuntime
[OUTPUT]: Attach, replay, follow, restart, and removal behaviour verification
[POS]:    Integration test layer - local process runtime
[UPDATE]: When changing CommandRuntime semantics
*/

#![cfg(unix)]

mod common;

use std::time::Duration;

use tailpane_runtime::{
    CommandRuntime, CommandSpec, LogOptions, RestartPolicy, RuntimeClient, RuntimeError,
    StreamKind,
};
use tokio::io::AsyncReadExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use common::{parse_frames, wait_until};

fn shell(script: &str) -> CommandSpec {
    CommandSpec::new("sh", vec!["-c".to_string(), script.to_string()])
}

async fn wait_for_exit(runtime: &CommandRuntime, source: &str) {
    let cancel = &CancellationToken::new();
    let exited = wait_until(Duration::from_secs(5), move || async move {
        !runtime.inspect_running(source, cancel).await.unwrap()
    })
    .await;
    assert!(exited, "{source} did not exit");
}

async fn read_all(runtime: &CommandRuntime, source: &str, options: &LogOptions) -> (bool, Vec<u8>) {
    let cancel = CancellationToken::new();
    let mut stream = runtime
        .open_log_stream(source, options, &cancel)
        .await
        .unwrap();
    let mut out = Vec::new();
    timeout(Duration::from_secs(5), stream.reader.read_to_end(&mut out))
        .await
        .expect("stream should end when the process exits")
        .unwrap();
    (stream.tty, out)
}

#[tokio::test]
async fn test_multiplexed_stream_carries_both_channels() {
    let runtime = CommandRuntime::new();
    runtime
        .register("app", shell("echo one; echo two >&2"))
        .unwrap();

    let (tty, bytes) = read_all(&runtime, "app", &LogOptions::default()).await;
    assert!(!tty);

    let frames = parse_frames(&bytes);
    assert!(frames.contains(&(StreamKind::Stdout, b"one\n".to_vec())));
    assert!(frames.contains(&(StreamKind::Stderr, b"two\n".to_vec())));
    assert_eq!(frames.len(), 2);
}

#[tokio::test]
async fn test_stream_filter_and_tail_on_replay() {
    let runtime = CommandRuntime::new();
    runtime
        .register("app", shell("printf 'a\\nb\\nc\\n'; echo hidden >&2"))
        .unwrap();
    wait_for_exit(&runtime, "app").await;

    let options = LogOptions {
        show_stderr: false,
        tail: Some("2".to_string()),
        follow: false,
        ..LogOptions::default()
    };
    let (_, bytes) = read_all(&runtime, "app", &options).await;
    let payloads: Vec<Vec<u8>> = parse_frames(&bytes).into_iter().map(|(_, p)| p).collect();
    assert_eq!(payloads, vec![b"b\n".to_vec(), b"c\n".to_vec()]);
}

#[tokio::test]
async fn test_tty_stream_with_timestamps_is_raw() {
    let runtime = CommandRuntime::new();
    runtime
        .register("app", shell("echo hello").with_tty(true))
        .unwrap();

    let options = LogOptions {
        timestamps: true,
        ..LogOptions::default()
    };
    let (tty, bytes) = read_all(&runtime, "app", &options).await;
    assert!(tty);

    let text = String::from_utf8(bytes).unwrap();
    let (stamp, rest) = text.split_once(' ').unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok(), "{stamp}");
    assert_eq!(rest, "hello\n");
}

#[tokio::test]
async fn test_restart_policy_reports_running_again() {
    let runtime = CommandRuntime::new();
    runtime
        .register(
            "app",
            shell("echo tick").with_restart(RestartPolicy::After(Duration::from_millis(50))),
        )
        .unwrap();
    wait_for_exit(&runtime, "app").await;

    let (runtime, cancel) = (&runtime, &CancellationToken::new());
    let restarted = wait_until(Duration::from_secs(5), move || async move {
        runtime.inspect_running("app", cancel).await.unwrap()
    })
    .await;
    assert!(restarted);
}

#[tokio::test]
async fn test_removed_source_is_not_found() {
    let runtime = CommandRuntime::new();
    runtime.register("app", shell("sleep 30")).unwrap();
    let cancel = CancellationToken::new();
    assert!(runtime.inspect_running("app", &cancel).await.unwrap());

    assert!(runtime.remove("app"));
    assert!(!runtime.remove("app"));
    assert!(runtime.sources().is_empty());

    let err = runtime.inspect_running("app", &cancel).await.unwrap_err();
    assert!(err.is_source_gone());
    let err = runtime
        .open_log_stream("app", &LogOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_source_gone());
}

#[tokio::test]
async fn test_cancelled_token_and_bad_spawn() {
    let runtime = CommandRuntime::new();
    runtime.register("app", shell("sleep 30")).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = runtime
        .open_log_stream("app", &LogOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    let err = runtime
        .register("ghost", CommandSpec::new("/definitely/not/a/binary", Vec::new()))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Spawn { .. }));
}

#[tokio::test]
async fn test_follow_stream_ends_on_cancel() {
    let runtime = CommandRuntime::new();
    runtime.register("app", shell("sleep 30")).unwrap();

    let cancel = CancellationToken::new();
    let mut stream = runtime
        .open_log_stream("app", &LogOptions::default(), &cancel)
        .await
        .unwrap();
    cancel.cancel();

    let mut out = Vec::new();
    timeout(Duration::from_secs(2), stream.reader.read_to_end(&mut out))
        .await
        .expect("relay should stop on cancel")
        .unwrap();
    assert!(out.is_empty());
    runtime.remove("app");
}

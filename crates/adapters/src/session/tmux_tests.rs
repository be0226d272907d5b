// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::sync::atomic::{AtomicU64, Ordering};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique session name per test to survive parallel runs.
fn unique_name(suffix: &str) -> String {
    let id = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("mc-test-{suffix}-{}-{id}", std::process::id())
}

/// Check if tmux is available on this system
fn tmux_available() -> bool {
    std::process::Command::new("tmux")
        .arg("-V")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! skip_without_tmux {
    () => {
        if !tmux_available() {
            eprintln!("skipping: tmux not available");
            return;
        }
    };
}

#[tokio::test]
#[serial(tmux)]
async fn spawn_session_and_capture() {
    skip_without_tmux!();
    let adapter = TmuxAdapter::new();
    let name = unique_name("spawn");

    let target = adapter
        .spawn_session(&name, std::path::Path::new("/tmp"), "echo ready && sleep 60")
        .await
        .unwrap();
    assert_eq!(target, name);
    assert!(adapter.is_alive(&target).await.unwrap());

    // Give the pane a moment to produce output.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let tail = adapter.capture_tail(&target, 50).await.unwrap();
    assert!(tail.contains("ready"), "tail was: {tail}");

    adapter.kill(&target).await.unwrap();
    assert!(!adapter.is_alive(&target).await.unwrap());
}

#[tokio::test]
#[serial(tmux)]
async fn spawn_fails_for_missing_cwd() {
    skip_without_tmux!();
    let adapter = TmuxAdapter::new();
    let err = adapter
        .spawn_session(
            &unique_name("badcwd"),
            std::path::Path::new("/definitely/not/here"),
            "true",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MultiplexerError::SpawnFailed(_)));
}

#[tokio::test]
#[serial(tmux)]
async fn exit_status_of_dead_pane() {
    skip_without_tmux!();
    let adapter = TmuxAdapter::new();
    let name = unique_name("exit");

    let target = adapter
        .spawn_session(&name, std::path::Path::new("/tmp"), "sh -c 'exit 3'")
        .await
        .unwrap();

    // remain-on-exit keeps the dead pane; poll for its status.
    let mut status = None;
    for _ in 0..20 {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        if let Ok(s) = adapter.exit_status(&target).await {
            if s.is_some() {
                status = s;
                break;
            }
        }
    }
    adapter.kill(&target).await.unwrap();
    assert_eq!(status, Some(3));
}

#[tokio::test]
#[serial(tmux)]
async fn send_keys_reaches_pane() {
    skip_without_tmux!();
    let adapter = TmuxAdapter::new();
    let name = unique_name("keys");

    let target = adapter
        .spawn_session(&name, std::path::Path::new("/tmp"), "cat")
        .await
        .unwrap();
    adapter.send_keys(&target, "hello-from-test").await.unwrap();
    adapter.send_enter(&target).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let tail = adapter.capture_tail(&target, 50).await.unwrap();
    adapter.kill(&target).await.unwrap();
    assert!(tail.contains("hello-from-test"), "tail was: {tail}");
}

#[tokio::test]
#[serial(tmux)]
async fn kill_unknown_target_is_quiet() {
    skip_without_tmux!();
    let adapter = TmuxAdapter::new();
    adapter.kill("mc-test-never-existed").await.unwrap();
}

#[test]
#[serial(tmux)]
fn inside_multiplexer_tracks_env() {
    let adapter = TmuxAdapter::new();
    let had = std::env::var_os("TMUX");
    std::env::remove_var("TMUX");
    assert!(!adapter.inside_multiplexer());
    std::env::set_var("TMUX", "/tmp/tmux-1000/default,1,0");
    assert!(adapter.inside_multiplexer());
    match had {
        Some(v) => std::env::set_var("TMUX", v),
        None => std::env::remove_var("TMUX"),
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mc_adapters::{subprocess::run_shell, FakeChatAdapter, FakeMultiplexer};
use mc_core::FakeClock;
use std::path::Path;
use std::time::Duration;

async fn sh(dir: &Path, script: &str) {
    let out = run_shell(script, Some(dir), Duration::from_secs(30))
        .await
        .unwrap();
    assert!(out.success(), "`{script}` failed: {}", out.combined());
}

async fn registry(
    tmp: &tempfile::TempDir,
) -> Registry<FakeMultiplexer, FakeChatAdapter, FakeClock> {
    let repo_dir = tmp.path().join("repo");
    std::fs::create_dir_all(&repo_dir).unwrap();
    sh(&repo_dir, "git init -q -b main").await;
    sh(&repo_dir, "git config user.email mc@test && git config user.name mc").await;
    sh(&repo_dir, "echo base > base.txt && git add -A && git commit -q -m base").await;

    Registry::new(
        FakeMultiplexer::new(),
        FakeChatAdapter::new(),
        FakeClock::default(),
        Git::new(&repo_dir),
        DataDir::at(tmp.path().join("state")),
        Config::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn start_with_no_plan_resumes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry(&tmp).await;
    assert!(registry.start().await.unwrap().is_none());
    registry.teardown();
}

#[tokio::test]
async fn start_plan_launches_jobs_through_the_loop() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry(&tmp).await;
    registry.start().await.unwrap();

    let plan = registry
        .start_plan(crate::PlanSpec {
            name: "p".into(),
            mode: mc_core::PlanMode::Autopilot,
            jobs: vec![crate::JobSpecInput::new("a", "prompt")],
            base_branch: Some("main".into()),
            launch_session_id: None,
        })
        .await
        .unwrap();
    assert_eq!(plan.status, mc_core::PlanStatus::Pending);

    // The loop's first pass promotes and launches.
    let mut launched = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let current = registry
            .orchestrator
            .plan_store()
            .load()
            .await
            .unwrap()
            .unwrap();
        if current.job("a").unwrap().status == mc_core::JobStatus::Running {
            launched = true;
            break;
        }
    }
    registry.teardown();
    assert!(launched, "loop never launched the job");
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry(&tmp).await;
    registry.start().await.unwrap();
    registry.teardown();
    registry.teardown();
}

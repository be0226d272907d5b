//! Scenarios: test failure rollback and test timeout.

use crate::prelude::*;
use mc_adapters::Git;
use mc_core::{FailureKind, JobStatus};
use mc_engine::{JobSpecInput, ReconcileOutcome};

#[tokio::test]
async fn failing_package_json_test_rolls_back() {
    let rig = rig().await;
    rig.orch
        .start_plan(autopilot(vec![JobSpecInput::new("a", "add a file")]))
        .await
        .unwrap();
    rig.orch.reconcile_once().await.unwrap();

    // The integration worktree carries a failing test script.
    let p = plan(&rig).await;
    let integration = Git::new(&p.integration_worktree);
    std::fs::write(
        p.integration_worktree.join("package.json"),
        r#"{"name":"it","scripts":{"test":"false"}}"#,
    )
    .unwrap();
    sh(&p.integration_worktree, "git add -A && git commit -q -m manifest").await;
    let snapshot = integration.rev_parse_head().await.unwrap();

    agent_commit(&rig, "a", "a.txt", "from-a").await;
    complete(&rig, "a").await;
    assert_eq!(settle(&rig).await, ReconcileOutcome::Paused);

    let p = plan(&rig).await;
    assert_eq!(p.job("a").unwrap().status, JobStatus::Failed);
    assert_eq!(
        p.checkpoint.unwrap().context.unwrap().failure_kind,
        Some(FailureKind::TestFailure)
    );

    // HEAD is back at the pre-merge snapshot and the tree is clean.
    assert_eq!(integration.rev_parse_head().await.unwrap(), snapshot);
    assert_eq!(integration.status_porcelain().await.unwrap(), "");
    assert!(!p.integration_worktree.join("a.txt").exists());
}

#[tokio::test]
async fn test_timeout_is_a_test_failure() {
    let rig = rig_with(|c| {
        c.test_command = Some("sleep 2".into());
        c.test_timeout_ms = 100;
    })
    .await;
    rig.orch
        .start_plan(autopilot(vec![JobSpecInput::new("a", "add a file")]))
        .await
        .unwrap();
    rig.orch.reconcile_once().await.unwrap();

    let p = plan(&rig).await;
    let integration = Git::new(&p.integration_worktree);
    let snapshot = integration.rev_parse_head().await.unwrap();

    agent_commit(&rig, "a", "a.txt", "from-a").await;
    complete(&rig, "a").await;
    assert_eq!(settle(&rig).await, ReconcileOutcome::Paused);

    let p = plan(&rig).await;
    let failed = p.job("a").unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(
        failed.error.as_deref().unwrap_or("").contains("timed out"),
        "{:?}",
        failed.error
    );
    assert_eq!(integration.rev_parse_head().await.unwrap(), snapshot);
}

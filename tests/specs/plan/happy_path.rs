//! Scenario: autopilot plan with two independent jobs runs to a PR.

use crate::prelude::*;
use mc_adapters::Git;
use mc_core::{JobStatus, MergeStrategy, PlanStatus};
use mc_engine::{JobSpecInput, ReconcileOutcome};

#[tokio::test]
async fn two_independent_jobs_merge_in_order_and_open_a_pr() {
    let rig = rig_with(|c| c.merge_strategy = MergeStrategy::Merge).await;
    rig.orch
        .start_plan(autopilot(vec![
            JobSpecInput::new("a", "add file a"),
            JobSpecInput::new("b", "add file b"),
        ]))
        .await
        .unwrap();

    // First pass launches both agents.
    rig.orch.reconcile_once().await.unwrap();
    let p = plan(&rig).await;
    assert_eq!(p.job("a").unwrap().status, JobStatus::Running);
    assert_eq!(p.job("b").unwrap().status, JobStatus::Running);
    assert_eq!(p.job("a").unwrap().merge_order, 0);
    assert_eq!(p.job("b").unwrap().merge_order, 1);

    // Each job adds one unique file.
    agent_commit(&rig, "a", "a.txt", "from-a").await;
    agent_commit(&rig, "b", "b.txt", "from-b").await;
    complete(&rig, "a").await;
    complete(&rig, "b").await;

    assert_eq!(settle(&rig).await, ReconcileOutcome::Stopped);

    let p = plan(&rig).await;
    assert_eq!(p.status, PlanStatus::Completed);
    assert_eq!(p.pr_url.as_deref(), Some("https://example.test/pr/1"));
    assert!(p.jobs.iter().all(|j| j.status == JobStatus::Merged));

    // Under the merge strategy, two merge commits in order a then b.
    let integration = Git::new(&p.integration_worktree);
    let log = integration.log_oneline(2).await.unwrap();
    assert_eq!(log, ["Merge b", "Merge a"]);
    assert!(p.integration_worktree.join("a.txt").exists());
    assert!(p.integration_worktree.join("b.txt").exists());

    // The launch session heard about the PR.
    let messages = rig.chat.messages_for("session-1");
    assert!(messages.iter().any(|m| m.contains("https://example.test/pr/1")));
}

#[tokio::test]
async fn squash_default_produces_synthesized_commits() {
    let rig = rig().await;
    rig.orch
        .start_plan(autopilot(vec![JobSpecInput::new("a", "add file a")]))
        .await
        .unwrap();
    rig.orch.reconcile_once().await.unwrap();
    agent_commit(&rig, "a", "a.txt", "from-a").await;
    complete(&rig, "a").await;
    assert_eq!(settle(&rig).await, ReconcileOutcome::Stopped);

    let p = plan(&rig).await;
    let integration = Git::new(&p.integration_worktree);
    assert_eq!(integration.log_oneline(1).await.unwrap(), ["Merge a"]);
    assert_eq!(p.status, PlanStatus::Completed);
}

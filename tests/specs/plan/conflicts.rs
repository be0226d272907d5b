//! Scenario: two jobs touching the same file; the second pauses the
//! plan with a conflict.

use crate::prelude::*;
use mc_adapters::Git;
use mc_core::{CheckpointKind, FailureKind, JobStatus, PlanStatus};
use mc_engine::{JobSpecInput, ReconcileOutcome};

#[tokio::test]
async fn second_job_conflicts_and_plan_pauses_clean() {
    let rig = rig().await;
    rig.orch
        .start_plan(autopilot(vec![
            JobSpecInput::new("a", "edit conflict.txt"),
            JobSpecInput::new("b", "edit conflict.txt too"),
        ]))
        .await
        .unwrap();

    rig.orch.reconcile_once().await.unwrap();
    agent_commit(&rig, "a", "conflict.txt", "from-a").await;
    agent_commit(&rig, "b", "conflict.txt", "from-b").await;
    complete(&rig, "a").await;
    complete(&rig, "b").await;

    assert_eq!(settle(&rig).await, ReconcileOutcome::Paused);

    let p = plan(&rig).await;
    assert_eq!(p.job("a").unwrap().status, JobStatus::Merged);
    assert_eq!(p.job("b").unwrap().status, JobStatus::NeedsRebase);
    assert_eq!(p.status, PlanStatus::Paused);

    let checkpoint = p.checkpoint.clone().unwrap();
    assert_eq!(checkpoint.kind, CheckpointKind::OnError);
    let context = checkpoint.context.unwrap();
    assert_eq!(context.job_name, "b");
    assert_eq!(context.failure_kind, Some(FailureKind::MergeConflict));

    // Integration worktree is clean, HEAD at a's merge.
    let integration = Git::new(&p.integration_worktree);
    assert_eq!(integration.status_porcelain().await.unwrap(), "");
    assert_eq!(integration.log_oneline(1).await.unwrap(), ["Merge a"]);

    // The user heard about the conflicting file.
    let messages = rig.chat.messages_for("session-1");
    assert!(messages.iter().any(|m| m.contains("conflict.txt")), "{messages:?}");
}

#[tokio::test]
async fn rebased_branch_retries_through_to_completion() {
    let rig = rig().await;
    rig.orch
        .start_plan(autopilot(vec![
            JobSpecInput::new("a", "edit conflict.txt"),
            JobSpecInput::new("b", "edit conflict.txt too"),
        ]))
        .await
        .unwrap();

    rig.orch.reconcile_once().await.unwrap();
    agent_commit(&rig, "a", "conflict.txt", "from-a").await;
    agent_commit(&rig, "b", "conflict.txt", "from-b").await;
    complete(&rig, "a").await;
    complete(&rig, "b").await;
    assert_eq!(settle(&rig).await, ReconcileOutcome::Paused);

    // Resolve b onto the integration branch, as the user would. The
    // worktrees share one repository, so the branch is directly
    // reachable.
    let p = plan(&rig).await;
    let wt = p.job("b").unwrap().worktree_path.clone().unwrap();
    sh(
        &wt,
        &format!(
            "git reset -q --hard {} && echo resolved > conflict.txt && \
             git add -A && git commit -q -m resolved",
            p.integration_branch,
        ),
    )
    .await;

    rig.orch
        .approve(mc_engine::ApproveArgs {
            retry: Some("b".into()),
            ..mc_engine::ApproveArgs::default()
        })
        .await
        .unwrap();

    assert_eq!(settle(&rig).await, ReconcileOutcome::Stopped);
    let p = plan(&rig).await;
    assert_eq!(p.status, PlanStatus::Completed);
    assert_eq!(p.job("b").unwrap().status, JobStatus::Merged);
}

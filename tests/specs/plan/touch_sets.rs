//! Scenario: touch-set violation fails the job; relaunch respawns the
//! agent with a correction prompt.

use crate::prelude::*;
use mc_adapters::MultiplexerCall;
use mc_core::{CheckpointKind, FailureKind, JobStatus};
use mc_engine::{ApproveArgs, JobSpecInput, ReconcileOutcome};

#[tokio::test]
async fn violation_pauses_and_relaunch_names_the_files() {
    let rig = rig().await;
    let mut job = JobSpecInput::new("a", "change only source files");
    job.touch_set = vec!["src/**".into()];
    rig.orch.start_plan(autopilot(vec![job])).await.unwrap();

    rig.orch.reconcile_once().await.unwrap();
    // The agent strays outside its touch-set.
    agent_commit(&rig, "a", "README.md", "stray edit").await;
    complete(&rig, "a").await;

    assert_eq!(settle(&rig).await, ReconcileOutcome::Paused);
    let p = plan(&rig).await;
    assert_eq!(p.job("a").unwrap().status, JobStatus::Failed);
    let context = p.checkpoint.as_ref().unwrap().context.clone().unwrap();
    assert_eq!(p.checkpoint.as_ref().unwrap().kind, CheckpointKind::OnError);
    assert_eq!(context.failure_kind, Some(FailureKind::Touchset));
    assert_eq!(context.touch_set_violations, ["README.md"]);

    // Relaunch: same worktree, fresh session, corrective prompt.
    rig.orch
        .approve(ApproveArgs {
            relaunch: Some("a".into()),
            ..ApproveArgs::default()
        })
        .await
        .unwrap();

    let p = plan(&rig).await;
    assert_eq!(p.job("a").unwrap().status, JobStatus::Running);
    assert!(p.checkpoint.is_none());

    let wt = p.job("a").unwrap().worktree_path.clone().unwrap();
    let prompt = std::fs::read_to_string(wt.join(".mc/prompt.md")).unwrap();
    assert!(prompt.contains("README.md"));
    assert!(prompt.contains("src/**"));

    let session_spawns = rig
        .mux
        .calls()
        .iter()
        .filter(|c| matches!(c, MultiplexerCall::SpawnSession { .. }))
        .count();
    assert_eq!(session_spawns, 2);
}

#[tokio::test]
async fn compliant_diff_passes_the_gate() {
    let rig = rig().await;
    let mut job = JobSpecInput::new("a", "change only source files");
    job.touch_set = vec!["src/**".into()];
    rig.orch.start_plan(autopilot(vec![job])).await.unwrap();

    rig.orch.reconcile_once().await.unwrap();
    agent_commit(&rig, "a", "src/lib.rs", "fn lib() {}").await;
    complete(&rig, "a").await;

    assert_eq!(settle(&rig).await, ReconcileOutcome::Stopped);
    let p = plan(&rig).await;
    assert_eq!(p.job("a").unwrap().status, JobStatus::Merged);
}

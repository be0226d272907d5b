//! Save → load identity and port allocation invariants.

use mc_core::{
    Checkpoint, CheckpointContext, CheckpointKind, FailureKind, JobStatus, Plan, PlanJob,
    PlanMode, PlanStatus,
};
use mc_storage::{DataDir, FileLocks, PlanStore, PortAllocator};

fn full_plan() -> Plan {
    let now = chrono::Utc::now();
    let mut job = PlanJob::new("j1", "api", "build the api")
        .with_touch_set(vec!["src/**".into()])
        .with_depends_on(vec![]);
    job.status = JobStatus::Merged;
    job.branch = Some("mc/api".into());
    job.worktree_path = Some("/tmp/wt/api".into());
    job.merged_at = Some(now);

    Plan {
        id: "p1".into(),
        name: "P1".into(),
        mode: PlanMode::Supervisor,
        status: PlanStatus::Paused,
        jobs: vec![job],
        integration_branch: "mc/integration".into(),
        integration_worktree: "/tmp/integration".into(),
        base_branch: "main".into(),
        base_commit: "abc123".into(),
        checkpoint: Some(Checkpoint {
            kind: CheckpointKind::PrePr,
            context: Some(CheckpointContext {
                job_name: "api".into(),
                failure_kind: Some(FailureKind::TestFailure),
                touch_set_violations: vec!["README.md".into()],
                touch_set_patterns: vec!["src/**".into()],
            }),
            set_at: now,
        }),
        created_at: now,
        updated_at: now,
        pr_url: Some("https://example.test/pr/9".into()),
        launch_session_id: Some("session-1".into()),
    }
}

#[tokio::test]
async fn save_load_is_identity() {
    let tmp = tempfile::tempdir().unwrap();
    let store = PlanStore::new(&DataDir::at(tmp.path()), &FileLocks::new());
    let plan = full_plan();
    store.save(&plan).await.unwrap();
    let loaded = store.load().await.unwrap().unwrap();
    similar_asserts::assert_eq!(loaded, plan);
}

#[tokio::test]
async fn allocated_ports_avoid_active_and_locked() {
    let tmp = tempfile::tempdir().unwrap();
    let data = DataDir::at(tmp.path());
    let ports = PortAllocator::new(&data, &FileLocks::new());

    let first = ports.allocate(14_100..=14_105, &[]).await.unwrap();
    let second = ports.allocate(14_100..=14_105, &[14_101]).await.unwrap();
    assert_eq!(first, 14_100);
    assert_eq!(second, 14_102);

    // Corrupt lock file degrades to empty.
    std::fs::write(data.port_lock_path(), b"not json").unwrap();
    let third = ports.allocate(14_100..=14_105, &[]).await.unwrap();
    assert_eq!(third, 14_100);

    // Release twice is fine.
    ports.release(third).await.unwrap();
    ports.release(third).await.unwrap();
}

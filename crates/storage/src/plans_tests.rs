// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mc_core::{PlanMode, PlanStatus};

fn plan(id: &str, job_names: &[&str]) -> Plan {
    let now = Utc::now();
    Plan {
        id: id.into(),
        name: "test".into(),
        mode: PlanMode::Autopilot,
        status: PlanStatus::Running,
        jobs: job_names
            .iter()
            .map(|n| PlanJob::new(format!("{n}-id"), *n, "prompt"))
            .collect(),
        integration_branch: "mc/integration".into(),
        integration_worktree: "/tmp/integration".into(),
        base_branch: "main".into(),
        base_commit: "abc".into(),
        checkpoint: None,
        created_at: now,
        updated_at: now,
        pr_url: None,
        launch_session_id: None,
    }
}

fn store(dir: &tempfile::TempDir) -> PlanStore {
    PlanStore::new(&DataDir::at(dir.path()), &FileLocks::new())
}

#[tokio::test]
async fn save_load_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let plan = plan("p1", &["a", "b"]);
    store.save(&plan).await.unwrap();
    let loaded = store.load().await.unwrap().unwrap();
    similar_asserts::assert_eq!(loaded, plan);
}

#[tokio::test]
async fn load_of_empty_store_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(store(&dir).load().await.unwrap().is_none());
}

#[tokio::test]
async fn save_rejects_different_plan_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store.save(&plan("p1", &["a"])).await.unwrap();
    let err = store.save(&plan("p2", &["a"])).await.unwrap_err();
    assert!(matches!(err, StorageError::PlanMismatch { .. }));

    // Same id re-saves fine.
    store.save(&plan("p1", &["a"])).await.unwrap();
}

#[tokio::test]
async fn clear_then_save_accepts_new_plan() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store.save(&plan("p1", &["a"])).await.unwrap();
    store.clear().await.unwrap();
    store.save(&plan("p2", &["a"])).await.unwrap();
    assert_eq!(store.load().await.unwrap().unwrap().id, "p2");
}

#[tokio::test]
async fn update_job_patches_only_that_job() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store.save(&plan("p1", &["a", "b"])).await.unwrap();

    store
        .update_job("p1", "a", JobPatch::status(JobStatus::Running))
        .await
        .unwrap();

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded.job("a").unwrap().status, JobStatus::Running);
    assert_eq!(loaded.job("b").unwrap().status, JobStatus::Queued);
}

#[tokio::test]
async fn update_job_unknown_name_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store.save(&plan("p1", &["a"])).await.unwrap();
    let err = store
        .update_job("p1", "ghost", JobPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::JobNotFound(_)));
}

#[tokio::test]
async fn concurrent_job_updates_all_survive() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let mut saved = plan("p1", &["a", "b", "c"]);
    for job in &mut saved.jobs {
        job.status = JobStatus::Running;
    }
    store.save(&saved).await.unwrap();

    let mut handles = Vec::new();
    for name in ["a", "b", "c"] {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .update_job("p1", name, JobPatch::status(JobStatus::Completed))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let loaded = store.load().await.unwrap().unwrap();
    for name in ["a", "b", "c"] {
        assert_eq!(
            loaded.job(name).unwrap().status,
            JobStatus::Completed,
            "job {name} lost its update"
        );
    }
}

#[tokio::test]
async fn update_fields_preserves_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store.save(&plan("p1", &["a"])).await.unwrap();
    store
        .update_job("p1", "a", JobPatch::status(JobStatus::Running))
        .await
        .unwrap();

    store
        .update_fields("p1", PlanPatch::status(PlanStatus::Paused))
        .await
        .unwrap();

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded.status, PlanStatus::Paused);
    assert_eq!(loaded.job("a").unwrap().status, JobStatus::Running);
}

#[tokio::test]
async fn corrupt_plan_is_a_schema_error_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let path = DataDir::at(dir.path()).plan_path();
    std::fs::write(&path, b"{ not json").unwrap();

    let err = store.load().await.unwrap_err();
    assert!(matches!(err, StorageError::Schema { .. }));
    // File untouched.
    assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");
}

#[test]
fn invalid_transition_warns_but_applies() {
    let mut job = PlanJob::new("j", "a", "p");
    job.status = JobStatus::Merged;
    let warning = apply_job_patch(&mut job, &JobPatch::status(JobStatus::Running));
    assert!(warning.is_some());
    assert_eq!(job.status, JobStatus::Running);
}

#[test]
fn valid_transition_does_not_warn() {
    let mut job = PlanJob::new("j", "a", "p");
    let warning = apply_job_patch(&mut job, &JobPatch::status(JobStatus::Running));
    assert!(warning.is_none());
}

#[test]
fn error_patch_can_clear() {
    let mut job = PlanJob::new("j", "a", "p");
    job.error = Some("boom".into());
    let patch = JobPatch {
        error: Some(None),
        ..JobPatch::default()
    };
    apply_job_patch(&mut job, &patch);
    assert_eq!(job.error, None);
}

#[test]
fn plan_patch_clears_checkpoint() {
    let mut p = plan("p1", &["a"]);
    p.checkpoint = Some(mc_core::Checkpoint {
        kind: mc_core::CheckpointKind::OnError,
        context: None,
        set_at: Utc::now(),
    });
    let patch = PlanPatch {
        checkpoint: Some(None),
        ..PlanPatch::default()
    };
    apply_plan_patch(&mut p, &patch);
    assert!(p.checkpoint.is_none());
}

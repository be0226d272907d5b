//! Shared test rig: real git repos in temp dirs, fake adapters, and a
//! stand-in `gh` that prints a fixed PR URL.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use mc_adapters::subprocess::run_shell;
use mc_adapters::{FakeChatAdapter, FakeMultiplexer, Git, VcsCli};
use mc_core::{Clock, Config, FakeClock, JobEvent, Plan, PlanMode};
use mc_engine::{
    JobMonitor, JobSpecInput, MonitorConfig, Notifier, Orchestrator, OrchestratorDeps, PlanSpec,
    ReconcileOutcome,
};
use mc_storage::{DataDir, FileLocks, PlanStore, ReportStore};
use std::path::Path;
use std::time::Duration;

pub async fn sh(dir: &Path, script: &str) {
    let out = run_shell(script, Some(dir), Duration::from_secs(30))
        .await
        .unwrap();
    assert!(out.success(), "`{script}` failed: {}", out.combined());
}

pub struct Rig {
    pub orch: Orchestrator<FakeMultiplexer, FakeChatAdapter, FakeClock>,
    pub mux: FakeMultiplexer,
    pub chat: FakeChatAdapter,
    pub clock: FakeClock,
    pub repo: Git,
    pub data: DataDir,
    pub tmp: tempfile::TempDir,
}

pub async fn rig_with(tweak: impl FnOnce(&mut Config)) -> Rig {
    let tmp = tempfile::tempdir().unwrap();
    let repo_dir = tmp.path().join("repo");
    std::fs::create_dir_all(&repo_dir).unwrap();
    sh(&repo_dir, "git init -q -b main").await;
    sh(&repo_dir, "git config user.email mc@test && git config user.name mc").await;
    sh(&repo_dir, "echo base > base.txt && git add -A && git commit -q -m base").await;
    sh(tmp.path(), "git init -q --bare origin.git").await;
    sh(
        &repo_dir,
        &format!(
            "git remote add origin {}",
            tmp.path().join("origin.git").display()
        ),
    )
    .await;

    let gh = tmp.path().join("fake-gh");
    std::fs::write(
        &gh,
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo fake 1.0; exit 0; fi\necho https://example.test/pr/1\n",
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&gh, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let data = DataDir::at(tmp.path().join("state"));
    data.ensure().unwrap();
    let mut config = Config::default();
    tweak(&mut config);

    let mux = FakeMultiplexer::new();
    let chat = FakeChatAdapter::new();
    let clock = FakeClock::default();
    let repo = Git::new(&repo_dir);
    let locks = FileLocks::new();
    let monitor = JobMonitor::new(
        mux.clone(),
        clock.clone(),
        ReportStore::new(&data),
        MonitorConfig::from(&config),
    );
    let notifier = Notifier::new(chat.clone(), PlanStore::new(&data, &locks));
    let orch = Orchestrator::new(OrchestratorDeps {
        mux: mux.clone(),
        clock: clock.clone(),
        repo: repo.clone(),
        data: data.clone(),
        config,
        monitor,
        notifier,
        vcs: VcsCli::new(gh.to_string_lossy().to_string()),
    });

    Rig {
        orch,
        mux,
        chat,
        clock,
        repo,
        data,
        tmp,
    }
}

pub async fn rig() -> Rig {
    rig_with(|_| {}).await
}

pub fn autopilot(jobs: Vec<JobSpecInput>) -> PlanSpec {
    PlanSpec {
        name: "P1".into(),
        mode: PlanMode::Autopilot,
        jobs,
        base_branch: Some("main".into()),
        launch_session_id: Some("session-1".into()),
    }
}

pub async fn plan(rig: &Rig) -> Plan {
    rig.orch.plan_store().load().await.unwrap().unwrap()
}

/// Commit a file on a launched job's branch, as the agent would.
pub async fn agent_commit(rig: &Rig, job_name: &str, file: &str, content: &str) {
    let p = plan(rig).await;
    let wt = p.job(job_name).unwrap().worktree_path.clone().unwrap();
    sh(
        &wt,
        &format!(
            "mkdir -p $(dirname {file}) && echo '{content}' > {file} && git add -A && git commit -q -m work"
        ),
    )
    .await;
}

/// Feed a completion event for a job into the orchestrator.
pub async fn complete(rig: &Rig, job_name: &str) {
    rig.clock.advance(1);
    let p = plan(rig).await;
    let job_id = p.job(job_name).unwrap().id.clone();
    rig.orch
        .handle_event(&JobEvent::Complete {
            job_id,
            job_name: job_name.into(),
            completed_at: rig.clock.epoch_ms(),
        })
        .await
        .unwrap();
}

/// Reconcile until the outcome is no longer `Continue`.
pub async fn settle(rig: &Rig) -> ReconcileOutcome {
    let mut last = ReconcileOutcome::Continue;
    for _ in 0..20 {
        last = rig.orch.reconcile_once().await.unwrap();
        if last != ReconcileOutcome::Continue {
            break;
        }
    }
    last
}

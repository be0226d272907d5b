// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator: the plan-wide reconciler.
//!
//! A periodic pass (plus event-triggered wakes) drives the plan toward
//! completion: launch eligible jobs under the parallelism bound, gate
//! completed jobs on their touch-sets, feed the merge train in merge
//! order, pause at checkpoints, and finalize with a pull request.

mod pr;

pub use pr::render_pr_body;

use crate::error::EngineError;
use crate::monitor::JobMonitor;
use crate::notifier::Notifier;
use crate::spawn::{self, SpawnRequest};
use crate::train::{JobSpec, MergeOutcome, MergeTrain, TrainConfig};
use mc_adapters::{ChatAdapter, Git, MultiplexerAdapter, VcsCli};
use mc_core::{
    graph, touchset, Checkpoint, CheckpointContext, CheckpointKind, Clock, Config, FailureKind,
    IdGen, JobEvent, JobStatus, Plan, PlanJob, PlanMode, PlanStatus, UuidIdGen,
};
use mc_storage::{
    DataDir, FileLocks, JobPatch, JobStore, LaunchedJobPatch, PlanPatch, PlanStore, PortAllocator,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Reconciler cadence.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(5);

/// User-supplied job description.
#[derive(Debug, Clone)]
pub struct JobSpecInput {
    pub name: String,
    pub prompt: String,
    pub touch_set: Vec<String>,
    pub depends_on: Vec<String>,
    pub branch: Option<String>,
}

impl JobSpecInput {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            touch_set: Vec::new(),
            depends_on: Vec::new(),
            branch: None,
        }
    }
}

/// User-supplied plan description.
#[derive(Debug, Clone)]
pub struct PlanSpec {
    pub name: String,
    pub mode: PlanMode,
    pub jobs: Vec<JobSpecInput>,
    /// Defaults to the repo's current branch.
    pub base_branch: Option<String>,
    pub launch_session_id: Option<String>,
}

/// Arguments to `approve`.
#[derive(Debug, Clone, Default)]
pub struct ApproveArgs {
    /// Reset this failed/conflicted job to `ready_to_merge`.
    pub retry: Option<String>,
    /// Respawn this job's agent with a touch-set correction prompt.
    pub relaunch: Option<String>,
}

/// Result of one reconciler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Pass ran; plan still in flight.
    Continue,
    /// Plan paused or checkpointed; nothing to do until approval.
    Paused,
    /// Plan reached a terminal state; the loop should stop.
    Stopped,
    /// Another pass was already running.
    Skipped,
}

/// Dependencies handed to the orchestrator at startup.
pub struct OrchestratorDeps<M: MultiplexerAdapter, Ch: ChatAdapter, C: Clock> {
    pub mux: M,
    pub clock: C,
    pub repo: Git,
    pub data: DataDir,
    pub config: Config,
    pub monitor: JobMonitor<M, C>,
    pub notifier: Notifier<Ch>,
    pub vcs: VcsCli,
}

struct OrchestratorInner<M: MultiplexerAdapter, Ch: ChatAdapter, C: Clock> {
    mux: M,
    clock: C,
    repo: Git,
    data: DataDir,
    config: Config,
    monitor: JobMonitor<M, C>,
    notifier: Notifier<Ch>,
    vcs: VcsCli,
    ids: UuidIdGen,

    plans: PlanStore,
    jobs: JobStore,
    ports: PortAllocator,

    train: tokio::sync::Mutex<Option<MergeTrain<C>>>,
    reconciling: AtomicBool,
    approved_merges: Mutex<HashSet<String>>,
    pr_approved: AtomicBool,
    /// Copilot mode's one-time initial approval.
    initial_approved: AtomicBool,
    wake_tx: Mutex<Option<mpsc::Sender<()>>>,
    loop_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    event_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Plan-wide driver; cheap to clone.
pub struct Orchestrator<M: MultiplexerAdapter, Ch: ChatAdapter, C: Clock> {
    inner: Arc<OrchestratorInner<M, Ch, C>>,
}

impl<M: MultiplexerAdapter, Ch: ChatAdapter, C: Clock> Clone for Orchestrator<M, Ch, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: MultiplexerAdapter, Ch: ChatAdapter, C: Clock> Orchestrator<M, Ch, C> {
    pub fn new(deps: OrchestratorDeps<M, Ch, C>) -> Self {
        let locks = FileLocks::new();
        let plans = PlanStore::new(&deps.data, &locks);
        let jobs = JobStore::new(&deps.data, &locks);
        let ports = PortAllocator::new(&deps.data, &locks);
        Self {
            inner: Arc::new(OrchestratorInner {
                mux: deps.mux,
                clock: deps.clock,
                repo: deps.repo,
                data: deps.data,
                config: deps.config,
                monitor: deps.monitor,
                notifier: deps.notifier,
                vcs: deps.vcs,
                ids: UuidIdGen,
                plans,
                jobs,
                ports,
                train: tokio::sync::Mutex::new(None),
                reconciling: AtomicBool::new(false),
                approved_merges: Mutex::new(HashSet::new()),
                pr_approved: AtomicBool::new(false),
                initial_approved: AtomicBool::new(false),
                wake_tx: Mutex::new(None),
                loop_task: Mutex::new(None),
                event_task: Mutex::new(None),
            }),
        }
    }

    pub fn plan_store(&self) -> &PlanStore {
        &self.inner.plans
    }

    pub fn job_store(&self) -> &JobStore {
        &self.inner.jobs
    }

    /// Validate and persist a new plan and create the integration
    /// branch/worktree. The caller starts the reconcile loop.
    pub async fn start_plan(&self, spec: PlanSpec) -> Result<Plan, EngineError> {
        if let Some(existing) = self.inner.plans.load().await? {
            return Err(EngineError::PlanExists(existing.name));
        }

        // Fail fast on user input; nothing is persisted past this point
        // until validation passes.
        let mut jobs: Vec<PlanJob> = spec
            .jobs
            .iter()
            .map(|j| {
                let mut job = PlanJob::new(self.inner.ids.next(), &j.name, &j.prompt)
                    .with_touch_set(j.touch_set.clone())
                    .with_depends_on(j.depends_on.clone());
                job.branch = j.branch.clone();
                job
            })
            .collect();
        graph::validate_graph(&jobs)?;
        let orders = graph::merge_order(&jobs)?;
        for job in &mut jobs {
            job.merge_order = orders.get(&job.name).copied().unwrap_or_default();
        }

        let base_branch = match &spec.base_branch {
            Some(branch) => branch.clone(),
            None => self.inner.repo.current_branch().await?,
        };
        let base_commit = self.inner.repo.rev_parse(&base_branch).await?;

        let safe_plan = spawn::sanitize_name(&spec.name);
        let integration_branch = format!("{}/{}-integration", self.inner.config.branch_prefix, safe_plan);
        let integration_worktree = self
            .inner
            .config
            .worktree_base_path
            .clone()
            .unwrap_or_else(|| self.inner.data.worktrees_dir())
            .join(format!("{safe_plan}-integration"));
        self.inner
            .repo
            .worktree_add(&integration_worktree, &integration_branch, &base_commit)
            .await?;

        let now = self.inner.clock.now();
        let plan = Plan {
            id: self.inner.ids.next(),
            name: spec.name.clone(),
            mode: spec.mode,
            status: PlanStatus::Pending,
            jobs,
            integration_branch,
            integration_worktree: integration_worktree.clone(),
            base_branch,
            base_commit,
            checkpoint: None,
            created_at: now,
            updated_at: now,
            pr_url: None,
            launch_session_id: spec.launch_session_id.clone(),
        };
        self.inner.plans.save(&plan).await?;

        *self.inner.train.lock().await = Some(MergeTrain::new(
            &integration_worktree,
            TrainConfig::from(&self.inner.config),
            self.inner.clock.clone(),
        ));

        Ok(plan)
    }

    /// Reattach to a live plan after a host restart.
    pub async fn resume_plan(&self) -> Result<Option<Plan>, EngineError> {
        let Some(plan) = self.inner.plans.load().await? else {
            return Ok(None);
        };
        if !matches!(plan.status, PlanStatus::Running | PlanStatus::Paused) {
            return Ok(None);
        }

        *self.inner.train.lock().await = Some(MergeTrain::new(
            &plan.integration_worktree,
            TrainConfig::from(&self.inner.config),
            self.inner.clock.clone(),
        ));

        for job in self.inner.jobs.running().await? {
            self.inner.monitor.watch(job);
        }

        Ok(Some(plan))
    }

    /// Cancel everything. Idempotent: a second call is a no-op.
    pub async fn cancel_plan(&self) -> Result<bool, EngineError> {
        let Some(plan) = self.inner.plans.load().await? else {
            return Ok(false);
        };

        self.stop_loop();

        for job in self.inner.jobs.load().await? {
            let _ = self.inner.mux.kill(&job.tmux_target).await;
            self.inner.monitor.unwatch(&job.id);
            if let Some(port) = job.port {
                let _ = self.inner.ports.release(port).await;
            }
            let _ = self.inner.jobs.remove(&job.id).await;
            // Plan entries persist with a terminal status.
            if let Some(plan_job) = plan.job(&job.name) {
                if !plan_job.status.is_terminal() {
                    let _ = self
                        .inner
                        .plans
                        .update_job(&plan.id, &job.name, JobPatch::status(JobStatus::Stopped))
                        .await;
                }
            }
        }
        self.inner.monitor.stop();

        let _ = self.inner.repo.worktree_remove(&plan.integration_worktree).await;
        self.inner.repo.delete_branch(&plan.integration_branch).await;

        *self.inner.train.lock().await = None;
        self.inner.plans.clear().await?;
        self.inner.jobs.clear().await?;
        Ok(true)
    }

    /// Clear a checkpoint, optionally asserting its kind.
    pub async fn clear_checkpoint(
        &self,
        kind: Option<CheckpointKind>,
    ) -> Result<(), EngineError> {
        let plan = self.inner.plans.load().await?.ok_or(EngineError::NoPlan)?;
        match (&plan.checkpoint, kind) {
            (None, Some(expected)) => Err(EngineError::CheckpointMismatch {
                expected: expected.to_string(),
                got: "none".to_string(),
            }),
            (None, None) => Err(EngineError::NoCheckpoint),
            (Some(current), Some(expected)) if current.kind != expected => {
                Err(EngineError::CheckpointMismatch {
                    expected: expected.to_string(),
                    got: current.kind.to_string(),
                })
            }
            (Some(_), _) => {
                self.inner
                    .plans
                    .update_fields(
                        &plan.id,
                        PlanPatch {
                            status: Some(PlanStatus::Running),
                            checkpoint: Some(None),
                            ..PlanPatch::default()
                        },
                    )
                    .await?;
                Ok(())
            }
        }
    }

    /// Approve the current checkpoint, optionally retrying or
    /// relaunching a failed job.
    pub async fn approve(&self, args: ApproveArgs) -> Result<(), EngineError> {
        if args.retry.is_some() && args.relaunch.is_some() {
            return Err(EngineError::RetryRelaunchConflict);
        }
        let plan = self.inner.plans.load().await?.ok_or(EngineError::NoPlan)?;

        if let Some(job_name) = &args.retry {
            self.approve_retry(&plan, job_name).await?;
        } else if let Some(job_name) = &args.relaunch {
            self.approve_relaunch(&plan, job_name).await?;
        } else if let Some(checkpoint) = &plan.checkpoint {
            match checkpoint.kind {
                CheckpointKind::PreMerge => {
                    if let Some(context) = &checkpoint.context {
                        self.inner
                            .approved_merges
                            .lock()
                            .insert(context.job_name.clone());
                    }
                    self.inner.initial_approved.store(true, Ordering::SeqCst);
                }
                CheckpointKind::PrePr => {
                    self.inner.pr_approved.store(true, Ordering::SeqCst);
                }
                CheckpointKind::OnError => {}
            }
        }

        if plan.checkpoint.is_some() {
            self.clear_checkpoint(None).await?;
        } else if plan.status == PlanStatus::Paused {
            self.inner
                .plans
                .update_fields(&plan.id, PlanPatch::status(PlanStatus::Running))
                .await?;
        }

        self.wake();
        Ok(())
    }

    async fn approve_retry(&self, plan: &Plan, job_name: &str) -> Result<(), EngineError> {
        let job = plan
            .job(job_name)
            .ok_or_else(|| EngineError::UnknownJob(job_name.to_string()))?;
        if !job.status.is_retryable() {
            return Err(EngineError::NotRetryable {
                job: job_name.to_string(),
                status: job.status.to_string(),
            });
        }

        // A touch-set failure must actually be fixed before the retry
        // clears the checkpoint.
        let was_touchset = plan
            .checkpoint
            .as_ref()
            .and_then(|c| c.context.as_ref())
            .map(|c| c.failure_kind == Some(FailureKind::Touchset) && c.job_name == job_name)
            .unwrap_or(false);
        if was_touchset {
            let violations = self.touch_set_violations(plan, job).await?;
            if !violations.is_empty() {
                return Err(EngineError::TouchSetStillViolated {
                    job: job_name.to_string(),
                    files: violations,
                });
            }
        }

        self.inner
            .plans
            .update_job(
                &plan.id,
                job_name,
                JobPatch {
                    status: Some(JobStatus::ReadyToMerge),
                    error: Some(None),
                    ..JobPatch::default()
                },
            )
            .await?;
        Ok(())
    }

    async fn approve_relaunch(&self, plan: &Plan, job_name: &str) -> Result<(), EngineError> {
        let job = plan
            .job(job_name)
            .ok_or_else(|| EngineError::UnknownJob(job_name.to_string()))?;
        let context = plan
            .checkpoint
            .as_ref()
            .and_then(|c| c.context.clone())
            .filter(|c| c.failure_kind == Some(FailureKind::Touchset) && c.job_name == job_name)
            .ok_or_else(|| {
                EngineError::Environment(format!(
                    "relaunch only applies to a touch-set failure checkpoint for {job_name}"
                ))
            })?;

        let launched = self
            .inner
            .jobs
            .by_name(job_name)
            .await?
            .ok_or_else(|| EngineError::UnknownJob(job_name.to_string()))?;

        // Correction prompt naming the violations, written over the old
        // prompt in the existing worktree.
        let correction = format!(
            "Your previous changes touched files outside the allowed set.\n\
             Allowed patterns: {}\n\
             Violating files: {}\n\
             Revert or move those changes so only allowed files are modified, \
             then finish the original task:\n\n{}",
            context.touch_set_patterns.join(", "),
            context.touch_set_violations.join(", "),
            job.prompt,
        );
        let prompt_path = launched.worktree_path.join(".mc/prompt.md");
        std::fs::write(&prompt_path, &correction).map_err(|e| {
            EngineError::Environment(format!("cannot write {}: {e}", prompt_path.display()))
        })?;

        let _ = self.inner.mux.kill(&launched.tmux_target).await;
        let cmd = format!(
            "bash '{}'",
            launched.worktree_path.join(".mc/launch.sh").display()
        );
        let session_name = format!("mc-{}", spawn::sanitize_name(job_name));
        let target = self
            .inner
            .mux
            .spawn_session(&session_name, &launched.worktree_path, &cmd)
            .await?;
        self.inner
            .jobs
            .update(
                &launched.id,
                LaunchedJobPatch {
                    tmux_target: Some(target),
                    ..LaunchedJobPatch::default()
                },
            )
            .await?;

        self.inner
            .plans
            .update_job(
                &plan.id,
                job_name,
                JobPatch {
                    status: Some(JobStatus::Running),
                    error: Some(None),
                    ..JobPatch::default()
                },
            )
            .await?;

        let mut relaunched = launched.clone();
        relaunched.created_at = self.inner.clock.now();
        relaunched.completed_at = None;
        self.inner.monitor.watch(relaunched);
        Ok(())
    }

    /// Hook monitor events into reconciliation.
    pub fn attach_events(&self) {
        let mut rx = self.inner.monitor.subscribe();
        let orch = self.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = orch.handle_event(&event).await {
                    tracing::warn!(event = %event.log_summary(), error = %e, "event handling failed");
                }
            }
        });
        if let Some(old) = self.inner.event_task.lock().replace(task) {
            old.abort();
        }
    }

    /// Apply a monitor event to plan state, then wake the reconciler.
    pub async fn handle_event(&self, event: &JobEvent) -> Result<(), EngineError> {
        let Some(plan) = self.inner.plans.load().await? else {
            return Ok(());
        };
        match event {
            JobEvent::Complete { job_name, .. } => {
                if let Some(job) = plan.job(job_name) {
                    if job.status == JobStatus::Running {
                        self.inner
                            .plans
                            .update_job(&plan.id, job_name, JobPatch::status(JobStatus::Completed))
                            .await?;
                    }
                }
                if let Some(launched) = self.inner.jobs.by_name(job_name).await? {
                    self.inner
                        .jobs
                        .update(
                            &launched.id,
                            LaunchedJobPatch {
                                completed_at: Some(self.inner.clock.now()),
                                ..LaunchedJobPatch::default()
                            },
                        )
                        .await?;
                }
            }
            JobEvent::Failed {
                job_name, error, ..
            } => {
                self.inner
                    .plans
                    .update_job(
                        &plan.id,
                        job_name,
                        JobPatch::failed(error.clone().unwrap_or_else(|| "agent failed".into())),
                    )
                    .await?;
                self.set_checkpoint(
                    &plan.id,
                    CheckpointKind::OnError,
                    Some(CheckpointContext {
                        job_name: job_name.clone(),
                        failure_kind: Some(FailureKind::JobFailed),
                        touch_set_violations: Vec::new(),
                        touch_set_patterns: Vec::new(),
                    }),
                )
                .await?;
            }
            // Advisory events only inform the user.
            JobEvent::Blocked { .. }
            | JobEvent::NeedsReview { .. }
            | JobEvent::AwaitingInput { .. }
            | JobEvent::Question { .. } => {}
        }
        self.wake();
        Ok(())
    }

    /// One reconciler pass. Self-mutually-exclusive.
    pub async fn reconcile_once(&self) -> Result<ReconcileOutcome, EngineError> {
        if self.inner.reconciling.swap(true, Ordering::SeqCst) {
            return Ok(ReconcileOutcome::Skipped);
        }
        let result = self.reconcile_pass().await;
        self.inner.reconciling.store(false, Ordering::SeqCst);
        result
    }

    async fn reconcile_pass(&self) -> Result<ReconcileOutcome, EngineError> {
        // 1. No plan or terminal plan: stop.
        let Some(mut plan) = self.inner.plans.load().await? else {
            return Ok(ReconcileOutcome::Stopped);
        };
        if plan.is_terminal() {
            return Ok(ReconcileOutcome::Stopped);
        }

        // 2. Paused or checkpointed: nothing until approval.
        if plan.status == PlanStatus::Paused || plan.checkpoint.is_some() {
            return Ok(ReconcileOutcome::Paused);
        }

        // 3. First pass promotes the plan.
        if plan.status == PlanStatus::Pending {
            plan = self
                .inner
                .plans
                .update_fields(&plan.id, PlanPatch::status(PlanStatus::Running))
                .await?;
        }

        // 4. Launch eligible jobs within the parallelism bound.
        let running = plan
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .count();
        let slots = self.inner.config.max_parallel.saturating_sub(running);
        let eligible = graph::ready_jobs(&plan.jobs);
        for name in eligible.into_iter().take(slots) {
            plan = self.launch(plan, &name).await?;
            if plan.checkpoint.is_some() {
                return Ok(ReconcileOutcome::Paused);
            }
        }

        // Jobs queued behind unmerged deps surface as waiting_deps.
        for job in plan.jobs.clone() {
            if job.status == JobStatus::Queued && !job.depends_on.is_empty() {
                let deps_merged = job.depends_on.iter().all(|d| {
                    plan.job(d).map(|j| j.status == JobStatus::Merged).unwrap_or(false)
                });
                if !deps_merged {
                    plan = self
                        .inner
                        .plans
                        .update_job(&plan.id, &job.name, JobPatch::status(JobStatus::WaitingDeps))
                        .await?;
                }
            }
        }

        // 5. Touch-set gate for completed jobs.
        for job in plan.jobs.clone() {
            if job.status != JobStatus::Completed {
                continue;
            }
            if job.touch_set.is_empty() {
                plan = self
                    .inner
                    .plans
                    .update_job(&plan.id, &job.name, JobPatch::status(JobStatus::ReadyToMerge))
                    .await?;
                continue;
            }
            let violations = self.touch_set_violations(&plan, &job).await?;
            if violations.is_empty() {
                plan = self
                    .inner
                    .plans
                    .update_job(&plan.id, &job.name, JobPatch::status(JobStatus::ReadyToMerge))
                    .await?;
            } else {
                plan = self
                    .inner
                    .plans
                    .update_job(
                        &plan.id,
                        &job.name,
                        JobPatch::failed(format!(
                            "touch-set violation: {}",
                            violations.join(", ")
                        )),
                    )
                    .await?;
                self.set_checkpoint(
                    &plan.id,
                    CheckpointKind::OnError,
                    Some(CheckpointContext {
                        job_name: job.name.clone(),
                        failure_kind: Some(FailureKind::Touchset),
                        touch_set_violations: violations,
                        touch_set_patterns: job.touch_set.clone(),
                    }),
                )
                .await?;
                return Ok(ReconcileOutcome::Paused);
            }
        }

        // 6. Feed the merge train in merge order.
        if let Some(outcome) = self.advance_merge_queue(&mut plan).await? {
            return Ok(outcome);
        }

        // 7. Process the head of the train.
        if let Some(outcome) = self.process_train(&mut plan).await? {
            return Ok(outcome);
        }

        // 8. Finalize once everything is merged.
        if plan.all_merged() && plan.status != PlanStatus::CreatingPr {
            if plan.mode == PlanMode::Supervisor
                && !self.inner.pr_approved.load(Ordering::SeqCst)
            {
                self.set_checkpoint(&plan.id, CheckpointKind::PrePr, None).await?;
                return Ok(ReconcileOutcome::Paused);
            }
            self.finalize(&plan).await?;
            return Ok(ReconcileOutcome::Stopped);
        }

        Ok(ReconcileOutcome::Continue)
    }

    async fn launch(&self, plan: Plan, job_name: &str) -> Result<Plan, EngineError> {
        let Some(job) = plan.job(job_name).cloned() else {
            return Ok(plan);
        };

        let active_ports: Vec<u16> = self
            .inner
            .jobs
            .load()
            .await?
            .iter()
            .filter_map(|j| j.port)
            .collect();
        let port = match self
            .inner
            .ports
            .allocate(self.inner.config.port_range(), &active_ports)
            .await
        {
            Ok(port) => Some(port),
            Err(e) => {
                // Pane polling still works without an event stream.
                tracing::warn!(job = job_name, error = %e, "no event port, falling back to polling");
                None
            }
        };

        let request = SpawnRequest {
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            prompt: job.prompt.clone(),
            branch: job.branch.clone(),
            start_point: plan.integration_branch.clone(),
            placement: self.inner.config.default_placement,
            launch_session_id: plan.launch_session_id.clone(),
            port,
        };

        match spawn::launch_job(
            &self.inner.mux,
            &self.inner.repo,
            &self.inner.jobs,
            &self.inner.data,
            &self.inner.config,
            &self.inner.clock,
            &plan.id,
            request,
        )
        .await
        {
            Ok(launched) => {
                self.inner.monitor.watch(launched.clone());
                let updated = self
                    .inner
                    .plans
                    .update_job(
                        &plan.id,
                        job_name,
                        JobPatch {
                            status: Some(JobStatus::Running),
                            branch: Some(launched.branch.clone()),
                            worktree_path: Some(launched.worktree_path.clone()),
                            ..JobPatch::default()
                        },
                    )
                    .await?;
                Ok(updated)
            }
            Err(e) => {
                tracing::error!(job = job_name, error = %e, "spawn failed");
                if let Some(port) = port {
                    let _ = self.inner.ports.release(port).await;
                }
                let updated = self
                    .inner
                    .plans
                    .update_job(&plan.id, job_name, JobPatch::failed(e.to_string()))
                    .await?;
                self.set_checkpoint(
                    &plan.id,
                    CheckpointKind::OnError,
                    Some(CheckpointContext {
                        job_name: job_name.to_string(),
                        failure_kind: Some(FailureKind::JobFailed),
                        touch_set_violations: Vec::new(),
                        touch_set_patterns: Vec::new(),
                    }),
                )
                .await?;
                // Reload so the caller sees the checkpoint.
                Ok(self.inner.plans.load().await?.unwrap_or(updated))
            }
        }
    }

    /// Step 6: move the next in-order ready job into the train.
    async fn advance_merge_queue(
        &self,
        plan: &mut Plan,
    ) -> Result<Option<ReconcileOutcome>, EngineError> {
        let ordered: Vec<PlanJob> = plan.jobs_by_merge_order().into_iter().cloned().collect();
        for job in ordered {
            match job.status {
                JobStatus::Merged => continue,
                JobStatus::ReadyToMerge => {
                    let branch = job.branch.clone().unwrap_or_default();

                    // Mergeability trial before the real merge.
                    let conflicts = {
                        let mut train = self.inner.train.lock().await;
                        let Some(train) = train.as_mut() else {
                            return Ok(None);
                        };
                        train.trial_merge(&branch).await?
                    };
                    if !conflicts.is_empty() {
                        *plan = self
                            .inner
                            .plans
                            .update_job(&plan.id, &job.name, JobPatch::status(JobStatus::NeedsRebase))
                            .await?;
                        self.set_checkpoint(
                            &plan.id,
                            CheckpointKind::OnError,
                            Some(CheckpointContext {
                                job_name: job.name.clone(),
                                failure_kind: Some(FailureKind::MergeConflict),
                                touch_set_violations: Vec::new(),
                                touch_set_patterns: Vec::new(),
                            }),
                        )
                        .await?;
                        self.inner
                            .notifier
                            .notify_merge(
                                &job.name,
                                &MergeOutcome::Conflict {
                                    files: conflicts,
                                },
                            )
                            .await;
                        return Ok(Some(ReconcileOutcome::Paused));
                    }

                    // Supervisor gates every merge; copilot gates the
                    // first one.
                    let needs_gate = match plan.mode {
                        PlanMode::Supervisor => {
                            !self.inner.approved_merges.lock().contains(&job.name)
                        }
                        PlanMode::Copilot => !self.inner.initial_approved.load(Ordering::SeqCst),
                        PlanMode::Autopilot => false,
                    };
                    if needs_gate {
                        self.set_checkpoint(
                            &plan.id,
                            CheckpointKind::PreMerge,
                            Some(CheckpointContext {
                                job_name: job.name.clone(),
                                failure_kind: None,
                                touch_set_violations: Vec::new(),
                                touch_set_patterns: Vec::new(),
                            }),
                        )
                        .await?;
                        return Ok(Some(ReconcileOutcome::Paused));
                    }

                    {
                        let mut train = self.inner.train.lock().await;
                        if let Some(train) = train.as_mut() {
                            train.enqueue(JobSpec {
                                id: job.id.clone(),
                                name: job.name.clone(),
                                branch,
                            });
                        }
                    }
                    *plan = self
                        .inner
                        .plans
                        .update_job(&plan.id, &job.name, JobPatch::status(JobStatus::Merging))
                        .await?;
                    self.inner
                        .plans
                        .update_fields(&plan.id, PlanPatch::status(PlanStatus::Merging))
                        .await?;
                    plan.status = PlanStatus::Merging;
                    return Ok(None);
                }
                // The next unmerged job in order is not ready yet.
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Step 7: run the train head and apply its outcome.
    async fn process_train(
        &self,
        plan: &mut Plan,
    ) -> Result<Option<ReconcileOutcome>, EngineError> {
        let processed = {
            let mut train = self.inner.train.lock().await;
            let Some(train) = train.as_mut() else {
                return Ok(None);
            };
            if !train.has_work() {
                return Ok(None);
            }
            train.process_next().await?
        };
        let Some((job, outcome)) = processed else {
            return Ok(None);
        };

        self.inner.notifier.notify_merge(&job.name, &outcome).await;

        match &outcome {
            MergeOutcome::Merged { merged_at, .. } => {
                *plan = self
                    .inner
                    .plans
                    .update_job(
                        &plan.id,
                        &job.name,
                        JobPatch {
                            status: Some(JobStatus::Merged),
                            merged_at: Some(*merged_at),
                            ..JobPatch::default()
                        },
                    )
                    .await?;
                self.inner.approved_merges.lock().remove(&job.name);
                self.inner.monitor.unwatch(&job.id);
                if let Some(launched) = self.inner.jobs.by_id(&job.id).await? {
                    if let Some(port) = launched.port {
                        let _ = self.inner.ports.release(port).await;
                    }
                }
                self.inner
                    .plans
                    .update_fields(&plan.id, PlanPatch::status(PlanStatus::Running))
                    .await?;
                plan.status = PlanStatus::Running;
                Ok(None)
            }
            MergeOutcome::Conflict { .. } => {
                *plan = self
                    .inner
                    .plans
                    .update_job(&plan.id, &job.name, JobPatch::status(JobStatus::Conflict))
                    .await?;
                self.set_checkpoint(
                    &plan.id,
                    CheckpointKind::OnError,
                    Some(CheckpointContext {
                        job_name: job.name.clone(),
                        failure_kind: Some(FailureKind::MergeConflict),
                        touch_set_violations: Vec::new(),
                        touch_set_patterns: Vec::new(),
                    }),
                )
                .await?;
                Ok(Some(ReconcileOutcome::Paused))
            }
            MergeOutcome::TestFailure { output, .. } => {
                *plan = self
                    .inner
                    .plans
                    .update_job(
                        &plan.id,
                        &job.name,
                        JobPatch::failed(truncate(output, 2_000)),
                    )
                    .await?;
                self.set_checkpoint(
                    &plan.id,
                    CheckpointKind::OnError,
                    Some(CheckpointContext {
                        job_name: job.name.clone(),
                        failure_kind: Some(FailureKind::TestFailure),
                        touch_set_violations: Vec::new(),
                        touch_set_patterns: Vec::new(),
                    }),
                )
                .await?;
                Ok(Some(ReconcileOutcome::Paused))
            }
        }
    }

    /// Step 8: push the integration branch and open the PR.
    async fn finalize(&self, plan: &Plan) -> Result<(), EngineError> {
        self.inner
            .plans
            .update_fields(&plan.id, PlanPatch::status(PlanStatus::CreatingPr))
            .await?;

        let integration = Git::new(&plan.integration_worktree);
        let push = integration.push("origin", &plan.integration_branch).await?;
        if !push.success() {
            let error = format!("push failed: {}", push.combined());
            self.inner
                .plans
                .update_fields(&plan.id, PlanPatch::status(PlanStatus::Failed))
                .await?;
            self.inner.notifier.notify_plan_failed(&error).await;
            return Ok(());
        }

        let body = render_pr_body(plan, &TrainConfig::from(&self.inner.config));
        match self
            .inner
            .vcs
            .pr_create(
                self.inner.repo.dir(),
                &plan.integration_branch,
                &plan.base_branch,
                &plan.name,
                &body,
            )
            .await
        {
            Ok(url) => {
                self.inner
                    .plans
                    .update_fields(
                        &plan.id,
                        PlanPatch {
                            status: Some(PlanStatus::Completed),
                            pr_url: Some(url.clone()),
                            ..PlanPatch::default()
                        },
                    )
                    .await?;
                self.inner.notifier.notify_plan_completed(&url).await;
            }
            Err(e) => {
                self.inner
                    .plans
                    .update_fields(&plan.id, PlanPatch::status(PlanStatus::Failed))
                    .await?;
                self.inner.notifier.notify_plan_failed(&e.to_string()).await;
            }
        }
        Ok(())
    }

    /// Diff the job branch against the integration branch and return
    /// files outside the declared patterns.
    async fn touch_set_violations(
        &self,
        plan: &Plan,
        job: &PlanJob,
    ) -> Result<Vec<String>, EngineError> {
        let Some(branch) = &job.branch else {
            return Ok(Vec::new());
        };
        let changed = self
            .inner
            .repo
            .changed_files(&plan.integration_branch, branch)
            .await?;
        Ok(touchset::violations(&changed, &job.touch_set)?)
    }

    /// Pause the plan at a checkpoint awaiting explicit approval.
    async fn set_checkpoint(
        &self,
        plan_id: &str,
        kind: CheckpointKind,
        context: Option<CheckpointContext>,
    ) -> Result<(), EngineError> {
        self.inner
            .plans
            .update_fields(
                plan_id,
                PlanPatch {
                    status: Some(PlanStatus::Paused),
                    checkpoint: Some(Some(Checkpoint {
                        kind,
                        context: context.clone(),
                        set_at: self.inner.clock.now(),
                    })),
                    ..PlanPatch::default()
                },
            )
            .await?;
        self.inner.notifier.notify_checkpoint(kind, context.as_ref()).await;
        Ok(())
    }

    /// Request an immediate reconcile pass.
    pub fn wake(&self) {
        if let Some(tx) = self.inner.wake_tx.lock().as_ref() {
            let _ = tx.try_send(());
        }
    }

    /// Start the periodic reconciler (idempotent).
    pub fn start_loop(&self) {
        let mut guard = self.inner.loop_task.lock();
        if guard.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }
        let (tx, mut rx) = mpsc::channel(8);
        *self.inner.wake_tx.lock() = Some(tx);
        let orch = self.clone();
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RECONCILE_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    received = rx.recv() => {
                        if received.is_none() {
                            break;
                        }
                    }
                }
                // A paused plan keeps the timer but every pass returns
                // immediately; only a missing or terminal plan ends the
                // loop.
                match orch.reconcile_once().await {
                    Ok(ReconcileOutcome::Stopped) => break,
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "reconcile pass failed"),
                }
            }
        }));
    }

    /// Stop the periodic reconciler.
    pub fn stop_loop(&self) {
        if let Some(task) = self.inner.loop_task.lock().take() {
            task.abort();
        }
        *self.inner.wake_tx.lock() = None;
    }

    /// Tear down background tasks (process shutdown).
    pub fn shutdown(&self) {
        self.stop_loop();
        if let Some(task) = self.inner.event_task.lock().take() {
            task.abort();
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job monitor: liveness and progress observation for running agents.
//!
//! Two observation modes per job. Pane polling is the fallback: hash
//! the pane tail, classify it, and time out idleness. When a job has an
//! event-stream port, a long-lived subscription delivers precise
//! lifecycle events. The agent's report file beats both.

mod activity;
mod emitter;
mod pane;

pub use activity::{JobActivity, MAX_FILES_EDITED};
pub use emitter::Emitter;
pub use pane::{classify_tail, hash_tail, PaneState};

use mc_adapters::{
    AgentStreamEvent, EventStreamClient, MultiplexerAdapter, MultiplexerError,
};
use mc_core::{
    Clock, Config, JobEvent, LaunchedJob, PendingQuestion, PermissionPolicy, ReportStatus,
};
use mc_storage::ReportStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Monitor tuning knobs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub idle_threshold: Duration,
    pub permission_policy: PermissionPolicy,
    /// Pane lines captured per poll.
    pub tail_lines: u32,
}

impl From<&Config> for MonitorConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            idle_threshold: Duration::from_millis(config.idle_threshold_ms),
            permission_policy: config.default_permission_policy,
            tail_lines: 50,
        }
    }
}

struct Watched {
    job: LaunchedJob,
    activity: JobActivity,
    last_hash: Option<u64>,
    last_changed_at_ms: u64,
    awaiting_notified: bool,
    /// Terminal event already emitted; stop observing.
    done: bool,
    stream_task: Option<tokio::task::JoinHandle<()>>,
}

#[derive(Default)]
struct MonitorState {
    jobs: HashMap<String, Watched>,
    questions: HashMap<(String, String), PendingQuestion>,
}

struct MonitorInner<M: MultiplexerAdapter, C: Clock> {
    mux: M,
    clock: C,
    reports: ReportStore,
    stream: EventStreamClient,
    config: MonitorConfig,
    emitter: Emitter,
    state: Mutex<MonitorState>,
    poll_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Observes running agents and emits semantic [`JobEvent`]s.
pub struct JobMonitor<M: MultiplexerAdapter, C: Clock> {
    inner: Arc<MonitorInner<M, C>>,
}

impl<M: MultiplexerAdapter, C: Clock> Clone for JobMonitor<M, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: MultiplexerAdapter, C: Clock> JobMonitor<M, C> {
    pub fn new(mux: M, clock: C, reports: ReportStore, config: MonitorConfig) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                mux,
                clock,
                reports,
                stream: EventStreamClient::new(),
                config,
                emitter: Emitter::new(),
                state: Mutex::new(MonitorState::default()),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to monitor events (per-subscriber FIFO).
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<JobEvent> {
        self.inner.emitter.subscribe()
    }

    /// Begin observing a launched job.
    pub fn watch(&self, job: LaunchedJob) {
        let now = self.inner.clock.epoch_ms();
        let port = job.port;
        let job_id = job.id.clone();
        let job_name = job.name.clone();
        {
            let mut state = self.inner.state.lock();
            state.jobs.insert(
                job_id.clone(),
                Watched {
                    job,
                    activity: JobActivity::default(),
                    last_hash: None,
                    last_changed_at_ms: now,
                    awaiting_notified: false,
                    done: false,
                    stream_task: None,
                },
            );
        }
        if let Some(port) = port {
            self.spawn_stream_consumer(job_id, job_name, port);
        }
    }

    /// Stop observing a job; drops its questions and subscription.
    pub fn unwatch(&self, job_id: &str) {
        let mut state = self.inner.state.lock();
        if let Some(watched) = state.jobs.remove(job_id) {
            if let Some(task) = watched.stream_task {
                task.abort();
            }
        }
        state.questions.retain(|(jid, _), _| jid != job_id);
    }

    /// Start the periodic poll loop.
    pub fn start(&self) {
        let monitor = self.clone();
        let interval = self.inner.config.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.poll_once().await;
            }
        });
        if let Some(old) = self.inner.poll_task.lock().replace(task) {
            old.abort();
        }
    }

    /// Abort subscriptions and timers, clear accumulators and questions.
    pub fn stop(&self) {
        if let Some(task) = self.inner.poll_task.lock().take() {
            task.abort();
        }
        let mut state = self.inner.state.lock();
        for (_, watched) in state.jobs.drain() {
            if let Some(task) = watched.stream_task {
                task.abort();
            }
        }
        state.questions.clear();
        self.inner.emitter.reset();
    }

    /// One observation pass over every watched job.
    pub async fn poll_once(&self) {
        let ids: Vec<String> = {
            let state = self.inner.state.lock();
            state
                .jobs
                .iter()
                .filter(|(_, w)| !w.done)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in ids {
            self.poll_job(&id).await;
        }
    }

    /// Activity accumulator snapshot for a job.
    pub fn activity(&self, job_id: &str) -> Option<JobActivity> {
        self.inner
            .state
            .lock()
            .jobs
            .get(job_id)
            .map(|w| w.activity.clone())
    }

    pub fn pending_questions(&self) -> Vec<PendingQuestion> {
        let mut questions: Vec<PendingQuestion> =
            self.inner.state.lock().questions.values().cloned().collect();
        questions.sort_by_key(|q| q.detected_at);
        questions
    }

    /// Drop a question once answered or abandoned.
    pub fn resolve_question(&self, job_id: &str, part_id: &str) {
        self.inner
            .state
            .lock()
            .questions
            .remove(&(job_id.to_string(), part_id.to_string()));
    }

    async fn poll_job(&self, job_id: &str) {
        let (job, last_hash, last_changed_at_ms, awaiting_notified) = {
            let state = self.inner.state.lock();
            let Some(watched) = state.jobs.get(job_id) else {
                return;
            };
            if watched.done {
                return;
            }
            (
                watched.job.clone(),
                watched.last_hash,
                watched.last_changed_at_ms,
                watched.awaiting_notified,
            )
        };

        // Agent-side report beats pane heuristics.
        match self.inner.reports.load(&job.id).await {
            Ok(Some(report)) => {
                {
                    let mut state = self.inner.state.lock();
                    if let Some(watched) = state.jobs.get_mut(job_id) {
                        watched.activity.record_report(
                            &report.message,
                            report.progress_clamped(),
                            report.timestamp,
                        );
                    }
                }
                match report.status {
                    ReportStatus::Completed => {
                        self.emit_terminal(
                            job_id,
                            JobEvent::Complete {
                                job_id: job.id.clone(),
                                job_name: job.name.clone(),
                                completed_at: report.timestamp,
                            },
                        );
                        return;
                    }
                    ReportStatus::NeedsReview => {
                        self.inner.emitter.emit(JobEvent::NeedsReview {
                            job_id: job.id.clone(),
                            job_name: job.name.clone(),
                            message: report.message.clone(),
                            report_timestamp: report.timestamp,
                        });
                        self.emit_terminal(
                            job_id,
                            JobEvent::Complete {
                                job_id: job.id.clone(),
                                job_name: job.name.clone(),
                                completed_at: report.timestamp,
                            },
                        );
                        return;
                    }
                    ReportStatus::Blocked => {
                        self.inner.emitter.emit(JobEvent::Blocked {
                            job_id: job.id.clone(),
                            job_name: job.name.clone(),
                            message: report.message.clone(),
                            report_timestamp: report.timestamp,
                        });
                    }
                    ReportStatus::Working | ReportStatus::Progress => {}
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(job = %job.name, error = %e, "unreadable report file");
            }
        }

        // Dead pane: exit status decides the outcome.
        match self.inner.mux.exit_status(&job.tmux_target).await {
            Ok(Some(code)) => {
                let event = if code == 0 {
                    JobEvent::Complete {
                        job_id: job.id.clone(),
                        job_name: job.name.clone(),
                        completed_at: self.inner.clock.epoch_ms(),
                    }
                } else {
                    JobEvent::Failed {
                        job_id: job.id.clone(),
                        job_name: job.name.clone(),
                        error: Some(format!("agent exited with status {code}")),
                        completed_at: self.inner.clock.epoch_ms(),
                    }
                };
                self.emit_terminal(job_id, event);
                return;
            }
            Ok(None) => {}
            Err(MultiplexerError::NotFound(_)) => {
                // Session vanished without a recorded exit.
                self.emit_terminal(
                    job_id,
                    JobEvent::Complete {
                        job_id: job.id.clone(),
                        job_name: job.name.clone(),
                        completed_at: self.inner.clock.epoch_ms(),
                    },
                );
                return;
            }
            Err(e) => {
                tracing::warn!(job = %job.name, error = %e, "exit status check failed");
                return;
            }
        }

        let tail = match self
            .inner
            .mux
            .capture_tail(&job.tmux_target, self.inner.config.tail_lines)
            .await
        {
            Ok(tail) => tail,
            Err(e) => {
                tracing::debug!(job = %job.name, error = %e, "capture failed");
                return;
            }
        };

        let now = self.inner.clock.epoch_ms();
        let hash = hash_tail(&tail);
        let pattern = classify_tail(&tail);
        let changed = last_hash != Some(hash);

        {
            let mut state = self.inner.state.lock();
            if let Some(watched) = state.jobs.get_mut(job_id) {
                watched.last_hash = Some(hash);
                if changed {
                    watched.last_changed_at_ms = now;
                    watched.activity.last_activity_at = Some(now);
                }
            }
        }

        if pattern == PaneState::AwaitingInput && !awaiting_notified {
            let emitted = self.inner.emitter.emit(JobEvent::AwaitingInput {
                job_id: job.id.clone(),
                job_name: job.name.clone(),
                instance_started_at: job.created_at.timestamp_millis().max(0) as u64,
            });
            if emitted {
                let mut state = self.inner.state.lock();
                if let Some(watched) = state.jobs.get_mut(job_id) {
                    watched.awaiting_notified = true;
                }
            }
        }

        let idle_for = now.saturating_sub(if changed { now } else { last_changed_at_ms });
        if !changed
            && pattern == PaneState::Idle
            && idle_for >= self.inner.config.idle_threshold.as_millis() as u64
        {
            self.emit_terminal(
                job_id,
                JobEvent::Complete {
                    job_id: job.id.clone(),
                    job_name: job.name.clone(),
                    completed_at: now,
                },
            );
        }
    }

    /// Emit a terminal event exactly once per job instance.
    fn emit_terminal(&self, job_id: &str, event: JobEvent) {
        {
            let mut state = self.inner.state.lock();
            let Some(watched) = state.jobs.get_mut(job_id) else {
                return;
            };
            if watched.done {
                return;
            }
            watched.done = true;
        }
        self.inner.emitter.emit(event);
    }

    fn spawn_stream_consumer(&self, job_id: String, job_name: String, port: u16) {
        let monitor = self.clone();
        let mut subscription = self.inner.stream.subscribe(port);
        let task_job_id = job_id.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.rx.recv().await {
                monitor.handle_stream_event(&task_job_id, &job_name, port, event);
            }
        });
        let mut state = self.inner.state.lock();
        if let Some(watched) = state.jobs.get_mut(&job_id) {
            if let Some(old) = watched.stream_task.replace(task) {
                old.abort();
            }
        } else {
            task.abort();
        }
    }

    fn handle_stream_event(
        &self,
        job_id: &str,
        job_name: &str,
        port: u16,
        event: AgentStreamEvent,
    ) {
        let now = self.inner.clock.epoch_ms();
        match event {
            AgentStreamEvent::SessionIdle => {
                self.emit_terminal(
                    job_id,
                    JobEvent::Complete {
                        job_id: job_id.to_string(),
                        job_name: job_name.to_string(),
                        completed_at: now,
                    },
                );
            }
            AgentStreamEvent::SessionError { message } => {
                self.emit_terminal(
                    job_id,
                    JobEvent::Failed {
                        job_id: job_id.to_string(),
                        job_name: job_name.to_string(),
                        error: Some(message),
                        completed_at: now,
                    },
                );
            }
            AgentStreamEvent::MessagePartUpdated {
                part_id,
                session_id,
                tool,
                status,
                question,
            } => {
                if tool.as_deref() != Some("question") {
                    return;
                }
                match status.as_deref() {
                    Some("running") => {
                        let Some(payload) = question else { return };
                        let pending = PendingQuestion {
                            job_id: job_id.to_string(),
                            part_id: part_id.clone(),
                            remote_session_id: session_id,
                            port,
                            question: payload.question,
                            options: payload.options,
                            multiple: payload.multiple,
                            detected_at: now,
                        };
                        let fresh = self
                            .inner
                            .state
                            .lock()
                            .questions
                            .insert(pending.key(), pending.clone())
                            .is_none();
                        if fresh {
                            self.inner.emitter.emit(JobEvent::Question {
                                job_name: job_name.to_string(),
                                question: pending,
                            });
                        }
                    }
                    Some("completed") | Some("error") => {
                        self.resolve_question(job_id, &part_id);
                    }
                    _ => {}
                }
            }
            AgentStreamEvent::FileEdited { path } => {
                let mut state = self.inner.state.lock();
                if let Some(watched) = state.jobs.get_mut(job_id) {
                    watched.activity.record_edit(&path, now);
                }
            }
            AgentStreamEvent::PermissionUpdated { id, title } => {
                match self.inner.config.permission_policy {
                    PermissionPolicy::Allow => {
                        tracing::info!(job = job_name, permission = %id, "auto-allowing permission request");
                    }
                    PermissionPolicy::Deny => {
                        tracing::info!(job = job_name, permission = %id, "auto-denying permission request");
                    }
                    PermissionPolicy::Prompt => {
                        // Relayed to the user like a question.
                        let pending = PendingQuestion {
                            job_id: job_id.to_string(),
                            part_id: format!("permission:{id}"),
                            remote_session_id: String::new(),
                            port,
                            question: title,
                            options: vec!["allow".into(), "deny".into()],
                            multiple: false,
                            detected_at: now,
                        };
                        let fresh = self
                            .inner
                            .state
                            .lock()
                            .questions
                            .insert(pending.key(), pending.clone())
                            .is_none();
                        if fresh {
                            self.inner.emitter.emit(JobEvent::Question {
                                job_name: job_name.to_string(),
                                question: pending,
                            });
                        }
                    }
                }
            }
            AgentStreamEvent::Unknown => {}
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;

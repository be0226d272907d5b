// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notifier: monitor events and orchestrator outcomes → chat messages.
//!
//! Everything here is best-effort: delivery failures are swallowed so a
//! broken chat surface never stalls orchestration. One consumer task
//! serializes delivery.

use crate::train::MergeOutcome;
use mc_adapters::{ChatAdapter, ToastVariant};
use mc_core::{CheckpointContext, CheckpointKind, JobEvent};
use mc_storage::PlanStore;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct NotifierState {
    seen: HashSet<String>,
    /// Base session titles, fetched once per session.
    titles: HashMap<String, String>,
    /// Jobs currently flagged in the session title.
    attention: BTreeSet<String>,
}

/// Formats and delivers user-facing notifications.
pub struct Notifier<Ch: ChatAdapter> {
    chat: Ch,
    plans: PlanStore,
    state: Arc<Mutex<NotifierState>>,
}

impl<Ch: ChatAdapter> Clone for Notifier<Ch> {
    fn clone(&self) -> Self {
        Self {
            chat: self.chat.clone(),
            plans: self.plans.clone(),
            state: self.state.clone(),
        }
    }
}

impl<Ch: ChatAdapter> Notifier<Ch> {
    pub fn new(chat: Ch, plans: PlanStore) -> Self {
        Self {
            chat,
            plans,
            state: Arc::new(Mutex::new(NotifierState::default())),
        }
    }

    /// Consume monitor events until the channel closes.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<JobEvent>) {
        while let Some(event) = rx.recv().await {
            self.notify_event(&event).await;
        }
    }

    /// Deliver one monitor event (at most once per dedup key).
    pub async fn notify_event(&self, event: &JobEvent) {
        if !self.state.lock().seen.insert(event.dedup_key()) {
            return;
        }
        let Some(session) = self.target_session().await else {
            return;
        };
        if self.chat.is_subagent(&session).await {
            return;
        }

        let (message, toast) = render_event(event);
        self.deliver(&session, &message, &toast_text(event), toast)
            .await;
        self.annotate_title(&session, event).await;
    }

    /// Merge-train outcome for a job.
    pub async fn notify_merge(&self, job_name: &str, outcome: &MergeOutcome) {
        let Some(session) = self.target_session().await else {
            return;
        };
        let (message, toast) = match outcome {
            MergeOutcome::Merged { .. } => (
                format!("✅ **{job_name}** merged into the integration branch."),
                ToastVariant::Success,
            ),
            MergeOutcome::Conflict { files } => (
                format!(
                    "⚠️ **{job_name}** hit merge conflicts in {}. \
                     Approve with retry after rebasing.",
                    files.join(", ")
                ),
                ToastVariant::Warning,
            ),
            MergeOutcome::TestFailure { test_report, .. } => (
                format!(
                    "❌ **{job_name}** failed the test gate{}. The merge was rolled back.",
                    test_report
                        .command
                        .as_deref()
                        .map(|c| format!(" (`{c}`)"))
                        .unwrap_or_default()
                ),
                ToastVariant::Error,
            ),
        };
        self.deliver(&session, &message, &format!("{job_name}: merge train"), toast)
            .await;
    }

    /// Checkpoint pause requiring approval.
    pub async fn notify_checkpoint(&self, kind: CheckpointKind, context: Option<&CheckpointContext>) {
        let Some(session) = self.target_session().await else {
            return;
        };
        let detail = context
            .map(|c| format!(" ({})", c.job_name))
            .unwrap_or_default();
        let message = format!(
            "⏸️ Plan paused at a **{kind}** checkpoint{detail}. Run `mc approve` to continue."
        );
        self.deliver(&session, &message, "plan paused", ToastVariant::Warning)
            .await;
    }

    pub async fn notify_plan_completed(&self, pr_url: &str) {
        let Some(session) = self.target_session().await else {
            return;
        };
        let message = format!("🎉 All jobs merged. Pull request: {pr_url}");
        self.deliver(&session, &message, "plan completed", ToastVariant::Success)
            .await;
    }

    pub async fn notify_plan_failed(&self, error: &str) {
        let Some(session) = self.target_session().await else {
            return;
        };
        let message = format!("❌ Plan failed: {error}");
        self.deliver(&session, &message, "plan failed", ToastVariant::Error)
            .await;
    }

    /// The plan's launching session, else the active one.
    async fn target_session(&self) -> Option<String> {
        if let Ok(Some(plan)) = self.plans.load().await {
            if let Some(session) = plan.launch_session_id {
                return Some(session);
            }
        }
        self.chat.active_session().await
    }

    async fn deliver(&self, session: &str, message: &str, toast: &str, variant: ToastVariant) {
        if let Err(e) = self.chat.send_message(session, message).await {
            tracing::debug!(error = %e, "notification dropped");
        }
        if let Err(e) = self.chat.show_toast(toast, variant).await {
            tracing::debug!(error = %e, "toast dropped");
        }
    }

    /// Track attention-worthy jobs in the session title.
    async fn annotate_title(&self, session: &str, event: &JobEvent) {
        let base = {
            let state = self.state.lock();
            state.titles.get(session).cloned()
        };
        let base = match base {
            Some(base) => base,
            None => {
                let fetched = self
                    .chat
                    .session_title(session)
                    .await
                    .unwrap_or_else(|_| session.to_string());
                self.state
                    .lock()
                    .titles
                    .insert(session.to_string(), fetched.clone());
                fetched
            }
        };

        let annotation = {
            let mut state = self.state.lock();
            state.attention.insert(event.job_name().to_string());
            if state.attention.len() == 1 {
                format!("{} done", event.job_name())
            } else {
                format!("{} jobs need attention", state.attention.len())
            }
        };

        let _ = self
            .chat
            .update_title(session, &format!("{base} — {annotation}"))
            .await;
    }
}

/// Message and toast variant for a monitor event, with a suggested next
/// command.
fn render_event(event: &JobEvent) -> (String, ToastVariant) {
    match event {
        JobEvent::Complete { job_name, .. } => (
            format!("✅ **{job_name}** finished. Run `mc status` for the merge queue."),
            ToastVariant::Success,
        ),
        JobEvent::Failed {
            job_name, error, ..
        } => (
            format!(
                "❌ **{job_name}** failed{}. Run `mc approve --retry {job_name}` after fixing.",
                error
                    .as_deref()
                    .map(|e| format!(": {e}"))
                    .unwrap_or_default()
            ),
            ToastVariant::Error,
        ),
        JobEvent::Blocked {
            job_name, message, ..
        } => (
            format!("🚧 **{job_name}** is blocked: {message}"),
            ToastVariant::Warning,
        ),
        JobEvent::NeedsReview {
            job_name, message, ..
        } => (
            format!("👀 **{job_name}** wants review: {message}"),
            ToastVariant::Warning,
        ),
        JobEvent::AwaitingInput { job_name, .. } => (
            format!("⌨️ **{job_name}** is waiting for input. Attach with `tmux attach -t mc-{job_name}`."),
            ToastVariant::Warning,
        ),
        JobEvent::Question {
            job_name, question, ..
        } => (
            format!(
                "❓ **{job_name}** asks: {} Run `mc answer {job_name}`.",
                question.question
            ),
            ToastVariant::Info,
        ),
    }
}

fn toast_text(event: &JobEvent) -> String {
    format!("{}: {}", event.job_name(), event.name())
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;

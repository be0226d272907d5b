// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan record and its status state machine.

use crate::job::PlanJob;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How much the orchestrator does without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Proceed through merge and PR creation automatically.
    Autopilot,
    /// Wait once for initial approval, then proceed.
    Copilot,
    /// Checkpoint before every merge and before the PR.
    Supervisor,
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanMode::Autopilot => write!(f, "autopilot"),
            PlanMode::Copilot => write!(f, "copilot"),
            PlanMode::Supervisor => write!(f, "supervisor"),
        }
    }
}

/// Plan lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Running,
    Paused,
    Merging,
    CreatingPr,
    Completed,
    Failed,
    Canceled,
}

impl PlanStatus {
    /// Whether a transition from `self` to `to` is in the valid table.
    ///
    /// Same-status writes are no-ops and always valid. Requests outside
    /// the table are logged by the caller and written anyway.
    pub fn can_transition(self, to: PlanStatus) -> bool {
        use PlanStatus::*;
        if self == to {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        // Any live plan can be canceled.
        if to == Canceled {
            return true;
        }
        matches!(
            (self, to),
            (Pending, Running)
                | (Running, Paused)
                | (Running, Merging)
                | (Running, CreatingPr)
                | (Running, Failed)
                | (Paused, Running)
                | (Paused, Failed)
                | (Merging, Running)
                | (Merging, Paused)
                | (Merging, Failed)
                | (CreatingPr, Completed)
                | (CreatingPr, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Canceled
        )
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Running => "running",
            PlanStatus::Paused => "paused",
            PlanStatus::Merging => "merging",
            PlanStatus::CreatingPr => "creating_pr",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// Why the orchestrator paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    PreMerge,
    OnError,
    PrePr,
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointKind::PreMerge => write!(f, "pre_merge"),
            CheckpointKind::OnError => write!(f, "on_error"),
            CheckpointKind::PrePr => write!(f, "pre_pr"),
        }
    }
}

/// What went wrong when an `on_error` checkpoint was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Touchset,
    MergeConflict,
    TestFailure,
    JobFailed,
}

/// Context recorded alongside a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointContext {
    pub job_name: String,
    pub failure_kind: Option<FailureKind>,
    /// Files outside the job's touch-set (touchset failures only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub touch_set_violations: Vec<String>,
    /// The patterns the job declared (touchset failures only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub touch_set_patterns: Vec<String>,
}

/// A checkpoint pause awaiting explicit user approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub kind: CheckpointKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CheckpointContext>,
    pub set_at: DateTime<Utc>,
}

/// The single active plan: an ordered set of jobs, the integration
/// branch they merge into, and the orchestration state around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub mode: PlanMode,
    pub status: PlanStatus,
    pub jobs: Vec<PlanJob>,
    pub integration_branch: String,
    pub integration_worktree: PathBuf,
    pub base_branch: String,
    pub base_commit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    /// Chat session that created the plan; notifications target it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_session_id: Option<String>,
}

impl Plan {
    pub fn job(&self, name: &str) -> Option<&PlanJob> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn job_mut(&mut self, name: &str) -> Option<&mut PlanJob> {
        self.jobs.iter_mut().find(|j| j.name == name)
    }

    /// Jobs in merge-train order.
    pub fn jobs_by_merge_order(&self) -> Vec<&PlanJob> {
        let mut ordered: Vec<&PlanJob> = self.jobs.iter().collect();
        ordered.sort_by_key(|j| j.merge_order);
        ordered
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when every job has reached `merged`.
    pub fn all_merged(&self) -> bool {
        !self.jobs.is_empty()
            && self
                .jobs
                .iter()
                .all(|j| j.status == crate::job::JobStatus::Merged)
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;

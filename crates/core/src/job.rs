// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job entry in a plan and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Status of a job through its lifecycle.
///
/// Flow: `queued → waiting_deps → running → {completed | failed} →
/// ready_to_merge → merging → {merged | conflict | needs_rebase}`.
/// `stopped` and `canceled` are terminal and reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    WaitingDeps,
    Running,
    Completed,
    Failed,
    ReadyToMerge,
    Merging,
    Merged,
    Conflict,
    NeedsRebase,
    Stopped,
    Canceled,
}

impl JobStatus {
    /// Whether a transition from `self` to `to` is in the valid table.
    ///
    /// A same-status write is treated as a no-op and always valid.
    /// Requests outside the table are logged by the caller and written
    /// anyway (defensive).
    pub fn can_transition(self, to: JobStatus) -> bool {
        use JobStatus::*;
        if self == to {
            return true;
        }
        // Terminal states never move; everything else may be stopped or canceled.
        if self.is_terminal() {
            return false;
        }
        if matches!(to, Stopped | Canceled) {
            return true;
        }
        matches!(
            (self, to),
            (Queued, WaitingDeps)
                | (Queued, Running)
                | (Queued, Failed)
                | (WaitingDeps, Queued)
                | (WaitingDeps, Running)
                | (WaitingDeps, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Completed, ReadyToMerge)
                | (Completed, Failed)
                | (Failed, ReadyToMerge)
                | (ReadyToMerge, Merging)
                | (ReadyToMerge, NeedsRebase)
                | (ReadyToMerge, Failed)
                | (Merging, Merged)
                | (Merging, Conflict)
                | (Merging, Failed)
                | (Merged, NeedsRebase)
                | (Conflict, ReadyToMerge)
                | (NeedsRebase, ReadyToMerge)
        )
    }

    /// Terminal statuses: no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Stopped | JobStatus::Canceled)
    }

    /// Statuses eligible for `approve(retry = job)`.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::Conflict | JobStatus::NeedsRebase
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::WaitingDeps => "waiting_deps",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::ReadyToMerge => "ready_to_merge",
            JobStatus::Merging => "merging",
            JobStatus::Merged => "merged",
            JobStatus::Conflict => "conflict",
            JobStatus::NeedsRebase => "needs_rebase",
            JobStatus::Stopped => "stopped",
            JobStatus::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// A job as recorded in the plan.
///
/// The runtime counterpart (tmux target, port, timestamps) lives in
/// [`crate::LaunchedJob`]; a plan job may exist before launch and after
/// its launched record is cleaned up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanJob {
    pub id: String,
    /// Unique within the plan.
    pub name: String,
    pub prompt: String,
    /// File glob patterns this job is permitted to modify.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub touch_set: Vec<String>,
    /// Names of jobs that must be merged before this one launches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    /// Position in the merge train; assigned from topological rank at
    /// plan creation and persisted so ordering survives restart.
    pub merge_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanJob {
    pub fn new(id: impl Into<String>, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prompt: prompt.into(),
            touch_set: Vec::new(),
            depends_on: Vec::new(),
            status: JobStatus::Queued,
            branch: None,
            worktree_path: None,
            merge_order: 0,
            merged_at: None,
            error: None,
        }
    }

    pub fn with_depends_on(mut self, deps: Vec<String>) -> Self {
        self.depends_on = deps;
        self
    }

    pub fn with_touch_set(mut self, patterns: Vec<String>) -> Self {
        self.touch_set = patterns;
        self
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

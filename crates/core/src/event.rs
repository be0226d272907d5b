// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic job events emitted by the monitor.

use crate::question::PendingQuestion;
use serde::{Deserialize, Serialize};

/// Events the job monitor emits about running agents.
///
/// Serializes with `{"type": "job:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// Agent finished its task.
    #[serde(rename = "job:complete")]
    Complete {
        job_id: String,
        job_name: String,
        /// Epoch milliseconds; tiebreaker in the dedup key.
        completed_at: u64,
    },

    /// Agent process failed or exited nonzero.
    #[serde(rename = "job:failed")]
    Failed {
        job_id: String,
        job_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        completed_at: u64,
    },

    /// Agent reported itself blocked (job keeps running).
    #[serde(rename = "job:blocked")]
    Blocked {
        job_id: String,
        job_name: String,
        message: String,
        /// Timestamp of the report that raised this.
        report_timestamp: u64,
    },

    /// Agent finished but wants a human look.
    #[serde(rename = "job:needs_review")]
    NeedsReview {
        job_id: String,
        job_name: String,
        message: String,
        report_timestamp: u64,
    },

    /// Pane is sitting at an input prompt (once per job instance).
    #[serde(rename = "job:awaiting_input")]
    AwaitingInput {
        job_id: String,
        job_name: String,
        /// Launch timestamp of the job instance, so a relaunch can
        /// notify again.
        instance_started_at: u64,
    },

    /// Agent asked a question via its question tool.
    #[serde(rename = "job:question")]
    Question {
        job_name: String,
        question: PendingQuestion,
    },
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Complete { .. } => "job:complete",
            JobEvent::Failed { .. } => "job:failed",
            JobEvent::Blocked { .. } => "job:blocked",
            JobEvent::NeedsReview { .. } => "job:needs_review",
            JobEvent::AwaitingInput { .. } => "job:awaiting_input",
            JobEvent::Question { .. } => "job:question",
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Complete { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Blocked { job_id, .. }
            | JobEvent::NeedsReview { job_id, .. }
            | JobEvent::AwaitingInput { job_id, .. } => job_id,
            JobEvent::Question { question, .. } => &question.job_id,
        }
    }

    pub fn job_name(&self) -> &str {
        match self {
            JobEvent::Complete { job_name, .. }
            | JobEvent::Failed { job_name, .. }
            | JobEvent::Blocked { job_name, .. }
            | JobEvent::NeedsReview { job_name, .. }
            | JobEvent::AwaitingInput { job_name, .. }
            | JobEvent::Question { job_name, .. } => job_name,
        }
    }

    /// Deduplication key: `(event, jobId, tiebreaker)`.
    ///
    /// Terminal events use the completion time; advisory events use the
    /// report timestamp or the question part id, so a *new* report or
    /// question notifies again while re-observations of the same one
    /// are dropped.
    pub fn dedup_key(&self) -> String {
        match self {
            JobEvent::Complete {
                job_id,
                completed_at,
                ..
            } => format!("complete:{job_id}:{completed_at}"),
            JobEvent::Failed {
                job_id,
                completed_at,
                ..
            } => format!("failed:{job_id}:{completed_at}"),
            JobEvent::Blocked {
                job_id,
                report_timestamp,
                ..
            } => format!("blocked:{job_id}:{report_timestamp}"),
            JobEvent::NeedsReview {
                job_id,
                report_timestamp,
                ..
            } => format!("needs_review:{job_id}:{report_timestamp}"),
            JobEvent::AwaitingInput {
                job_id,
                instance_started_at,
                ..
            } => format!("awaiting_input:{job_id}:{instance_started_at}"),
            JobEvent::Question { question, .. } => {
                format!("question:{}:{}", question.job_id, question.part_id)
            }
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            JobEvent::Complete { job_name, .. } | JobEvent::AwaitingInput { job_name, .. } => {
                format!("{t} job={job_name}")
            }
            JobEvent::Failed {
                job_name, error, ..
            } => match error {
                Some(e) => format!("{t} job={job_name} error={e}"),
                None => format!("{t} job={job_name}"),
            },
            JobEvent::Blocked { job_name, .. } | JobEvent::NeedsReview { job_name, .. } => {
                format!("{t} job={job_name}")
            }
            JobEvent::Question {
                job_name, question, ..
            } => format!("{t} job={job_name} part={}", question.part_id),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

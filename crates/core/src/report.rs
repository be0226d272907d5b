// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-written progress report (side channel).
//!
//! Agents persist this to `reports/<jobId>.json` under the mc data
//! directory; the monitor reads it on every poll and it takes priority
//! over pane heuristics.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Working,
    Progress,
    Blocked,
    NeedsReview,
    Completed,
}

impl ReportStatus {
    /// Statuses that mark the job complete regardless of pane state.
    pub fn is_completion(self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::NeedsReview)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportStatus::Working => "working",
            ReportStatus::Progress => "progress",
            ReportStatus::Blocked => "blocked",
            ReportStatus::NeedsReview => "needs_review",
            ReportStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReport {
    pub job_id: String,
    pub job_name: String,
    pub status: ReportStatus,
    pub message: String,
    /// Percent complete, clamped to 0–100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Epoch milliseconds when the agent wrote the report.
    pub timestamp: u64,
}

impl AgentReport {
    /// Progress with out-of-range values clamped.
    pub fn progress_clamped(&self) -> Option<u8> {
        self.progress.map(|p| p.min(100))
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;

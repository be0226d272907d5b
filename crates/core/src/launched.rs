// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime record of a launched job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where the job's multiplexer view lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Standalone session named `mc-<job>`.
    #[default]
    Session,
    /// Window inside the user's current session.
    Window,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Session => write!(f, "session"),
            Placement::Window => write!(f, "window"),
        }
    }
}

/// The runtime counterpart of a plan job: allocated once an agent is
/// actually running in a worktree. Removed on cancellation or cleanup
/// while the plan entry may persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchedJob {
    pub id: String,
    pub name: String,
    pub branch: String,
    pub worktree_path: PathBuf,
    /// Multiplexer target: session name or `session:window` pair.
    pub tmux_target: String,
    pub placement: Placement,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Chat session that launched the plan, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_session_id: Option<String>,
    /// Local port of the agent's event stream, when allocated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl LaunchedJob {
    pub fn is_running(&self) -> bool {
        self.completed_at.is_none()
    }
}

#[cfg(test)]
#[path = "launched_tests.rs"]
mod tests;

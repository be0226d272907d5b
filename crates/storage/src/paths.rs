// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data directory layout.
//!
//! ```text
//! <root>/
//!   plan.json           single active plan
//!   jobs.json           launched-job records (schema v3)
//!   port.lock           reserved event-stream ports
//!   reports/<jobId>.json agent-written progress reports
//!   last-status-time    auto-status rate limiter timestamp
//!   completed-jobs.log  append-only pane-died log
//!   worktrees/          default parent for job worktrees
//! ```

use crate::error::StorageError;
use std::path::{Path, PathBuf};

/// Environment variable overriding the state root.
pub const STATE_DIR_ENV: &str = "MC_STATE_DIR";

/// Resolved data directory for one host user.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve from `$MC_STATE_DIR`, else `~/.local/state/mc`.
    pub fn resolve() -> Self {
        let root = std::env::var_os(STATE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local/state/mc")
            });
        Self { root }
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory tree if missing.
    pub fn ensure(&self) -> Result<(), StorageError> {
        for dir in [&self.root, &self.reports_dir(), &self.worktrees_dir()] {
            std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir.clone(), e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plan_path(&self) -> PathBuf {
        self.root.join("plan.json")
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.root.join("jobs.json")
    }

    pub fn port_lock_path(&self) -> PathBuf {
        self.root.join("port.lock")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn report_path(&self, job_id: &str) -> PathBuf {
        self.reports_dir().join(format!("{job_id}.json"))
    }

    pub fn last_status_path(&self) -> PathBuf {
        self.root.join("last-status-time")
    }

    pub fn completed_jobs_log(&self) -> PathBuf {
        self.root.join("completed-jobs.log")
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.root.join("worktrees")
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;

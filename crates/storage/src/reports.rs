// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent report files (`reports/<jobId>.json`).

use crate::atomic;
use crate::error::StorageError;
use crate::paths::DataDir;
use mc_core::AgentReport;
use std::path::PathBuf;

/// Reader for agent-written progress reports.
#[derive(Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(data: &DataDir) -> Self {
        Self {
            dir: data.reports_dir(),
        }
    }

    fn path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{job_id}.json"))
    }

    /// Load the report for a job, if the agent has written one.
    pub async fn load(&self, job_id: &str) -> Result<Option<AgentReport>, StorageError> {
        let path = self.path(job_id);
        let Some(bytes) = atomic::read_if_exists(&path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::schema(path, &e))
    }

    /// Remove a consumed report (idempotent).
    pub async fn remove(&self, job_id: &str) -> Result<(), StorageError> {
        atomic::remove_if_exists(&self.path(job_id)).await
    }
}

#[cfg(test)]
#[path = "reports_tests.rs"]
mod tests;

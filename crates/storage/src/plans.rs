// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan persistence (`plan.json`).
//!
//! At most one plan exists. All mutation goes through read-merge-write
//! under the file's mutex, so concurrent job updates on different jobs
//! never lose each other's writes.

use crate::atomic::{self, FileLocks};
use crate::error::StorageError;
use crate::paths::DataDir;
use chrono::{DateTime, Utc};
use mc_core::{Checkpoint, JobStatus, Plan, PlanJob, PlanStatus};
use std::path::PathBuf;
use std::sync::Arc;

/// Partial update for a single plan job.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub branch: Option<String>,
    pub worktree_path: Option<PathBuf>,
    pub merge_order: Option<u32>,
    pub merged_at: Option<DateTime<Utc>>,
    /// `Some(None)` clears a previous error.
    pub error: Option<Option<String>>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(Some(error.into())),
            ..Self::default()
        }
    }
}

/// Partial update for plan-level fields; jobs are never touched.
#[derive(Debug, Clone, Default)]
pub struct PlanPatch {
    pub status: Option<PlanStatus>,
    /// `Some(None)` clears the checkpoint.
    pub checkpoint: Option<Option<Checkpoint>>,
    pub pr_url: Option<String>,
}

impl PlanPatch {
    pub fn status(status: PlanStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Apply a job patch, returning a warning for an out-of-table status
/// transition. The write still proceeds (defensive).
pub fn apply_job_patch(job: &mut PlanJob, patch: &JobPatch) -> Option<String> {
    let mut warning = None;
    if let Some(status) = patch.status {
        if !job.status.can_transition(status) {
            warning = Some(format!(
                "job {}: transition {} -> {} is outside the valid table",
                job.name, job.status, status
            ));
        }
        job.status = status;
    }
    if let Some(branch) = &patch.branch {
        job.branch = Some(branch.clone());
    }
    if let Some(path) = &patch.worktree_path {
        job.worktree_path = Some(path.clone());
    }
    if let Some(order) = patch.merge_order {
        job.merge_order = order;
    }
    if let Some(at) = patch.merged_at {
        job.merged_at = Some(at);
    }
    if let Some(error) = &patch.error {
        job.error = error.clone();
    }
    warning
}

/// Apply a plan patch, returning a warning for an out-of-table status
/// transition.
pub fn apply_plan_patch(plan: &mut Plan, patch: &PlanPatch) -> Option<String> {
    let mut warning = None;
    if let Some(status) = patch.status {
        if !plan.status.can_transition(status) {
            warning = Some(format!(
                "plan {}: transition {} -> {} is outside the valid table",
                plan.id, plan.status, status
            ));
        }
        plan.status = status;
    }
    if let Some(checkpoint) = &patch.checkpoint {
        plan.checkpoint = checkpoint.clone();
    }
    if let Some(url) = &patch.pr_url {
        plan.pr_url = Some(url.clone());
    }
    warning
}

/// Store for the single active plan.
#[derive(Clone)]
pub struct PlanStore {
    path: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl PlanStore {
    pub fn new(data: &DataDir, locks: &FileLocks) -> Self {
        let path = data.plan_path();
        let lock = locks.for_path(&path);
        Self { path, lock }
    }

    pub async fn load(&self) -> Result<Option<Plan>, StorageError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    /// Persist a plan. Rejected when a different plan already exists;
    /// the caller must `clear` first.
    pub async fn save(&self, plan: &Plan) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        if let Some(existing) = self.read().await? {
            if existing.id != plan.id {
                return Err(StorageError::PlanMismatch {
                    existing: existing.id,
                    attempted: plan.id.clone(),
                });
            }
        }
        self.write(plan).await
    }

    /// Read-merge-write a single job. Sibling jobs changed by concurrent
    /// callers are re-read inside the lock, so their updates survive.
    pub async fn update_job(
        &self,
        plan_id: &str,
        job_name: &str,
        patch: JobPatch,
    ) -> Result<Plan, StorageError> {
        let _guard = self.lock.lock().await;
        let mut plan = self
            .read()
            .await?
            .ok_or_else(|| StorageError::PlanNotFound(plan_id.to_string()))?;
        if plan.id != plan_id {
            return Err(StorageError::PlanMismatch {
                existing: plan.id,
                attempted: plan_id.to_string(),
            });
        }
        let job = plan
            .job_mut(job_name)
            .ok_or_else(|| StorageError::JobNotFound(job_name.to_string()))?;
        if let Some(warning) = apply_job_patch(job, &patch) {
            tracing::warn!("{warning}");
        }
        plan.updated_at = Utc::now();
        self.write(&plan).await?;
        Ok(plan)
    }

    /// Read-merge-write plan-level fields, preserving jobs.
    pub async fn update_fields(
        &self,
        plan_id: &str,
        patch: PlanPatch,
    ) -> Result<Plan, StorageError> {
        let _guard = self.lock.lock().await;
        let mut plan = self
            .read()
            .await?
            .ok_or_else(|| StorageError::PlanNotFound(plan_id.to_string()))?;
        if plan.id != plan_id {
            return Err(StorageError::PlanMismatch {
                existing: plan.id,
                attempted: plan_id.to_string(),
            });
        }
        if let Some(warning) = apply_plan_patch(&mut plan, &patch) {
            tracing::warn!("{warning}");
        }
        plan.updated_at = Utc::now();
        self.write(&plan).await?;
        Ok(plan)
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        atomic::remove_if_exists(&self.path).await
    }

    async fn read(&self) -> Result<Option<Plan>, StorageError> {
        let Some(bytes) = atomic::read_if_exists(&self.path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::schema(self.path.clone(), &e))
    }

    async fn write(&self, plan: &Plan) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(plan)
            .map_err(|e| StorageError::schema(self.path.clone(), &e))?;
        atomic::write_atomic(&self.path, &bytes).await
    }
}

#[cfg(test)]
#[path = "plans_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launched-job persistence (`jobs.json`).
//!
//! Schema history:
//! - v1: `{version, jobs, updatedAt}`
//! - v2: adds top-level `planId`
//! - v3: adds per-job `launchSessionId` (default absent)
//!
//! Files are forward-migrated on load; an unknown newer version is a
//! schema error, never overwritten.

use crate::atomic::{self, FileLocks};
use crate::error::StorageError;
use crate::paths::DataDir;
use chrono::{DateTime, Utc};
use mc_core::LaunchedJob;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const JOBS_SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobsFile {
    version: u32,
    jobs: Vec<LaunchedJob>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    plan_id: Option<String>,
}

impl Default for JobsFile {
    fn default() -> Self {
        Self {
            version: JOBS_SCHEMA_VERSION,
            jobs: Vec::new(),
            updated_at: Utc::now(),
            plan_id: None,
        }
    }
}

/// Partial update for a launched job.
#[derive(Debug, Clone, Default)]
pub struct LaunchedJobPatch {
    pub completed_at: Option<DateTime<Utc>>,
    pub port: Option<u16>,
    pub tmux_target: Option<String>,
}

/// Store for runtime job records.
#[derive(Clone)]
pub struct JobStore {
    path: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl JobStore {
    pub fn new(data: &DataDir, locks: &FileLocks) -> Self {
        let path = data.jobs_path();
        let lock = locks.for_path(&path);
        Self { path, lock }
    }

    pub async fn load(&self) -> Result<Vec<LaunchedJob>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.jobs)
    }

    pub async fn plan_id(&self) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.plan_id)
    }

    pub async fn add(
        &self,
        job: LaunchedJob,
        plan_id: Option<String>,
    ) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        file.jobs.retain(|j| j.id != job.id);
        file.jobs.push(job);
        if plan_id.is_some() {
            file.plan_id = plan_id;
        }
        self.write(&mut file).await
    }

    pub async fn update(&self, id: &str, patch: LaunchedJobPatch) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let job = file
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| StorageError::JobNotFound(id.to_string()))?;
        if let Some(at) = patch.completed_at {
            job.completed_at = Some(at);
        }
        if let Some(port) = patch.port {
            job.port = Some(port);
        }
        if let Some(target) = patch.tmux_target {
            job.tmux_target = target;
        }
        self.write(&mut file).await
    }

    /// Remove a job record (idempotent).
    pub async fn remove(&self, id: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        file.jobs.retain(|j| j.id != id);
        self.write(&mut file).await
    }

    pub async fn running(&self) -> Result<Vec<LaunchedJob>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read()
            .await?
            .jobs
            .into_iter()
            .filter(|j| j.is_running())
            .collect())
    }

    pub async fn by_name(&self, name: &str) -> Result<Option<LaunchedJob>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.jobs.into_iter().find(|j| j.name == name))
    }

    pub async fn by_id(&self, id: &str) -> Result<Option<LaunchedJob>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.jobs.into_iter().find(|j| j.id == id))
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        atomic::remove_if_exists(&self.path).await
    }

    async fn read(&self) -> Result<JobsFile, StorageError> {
        let Some(bytes) = atomic::read_if_exists(&self.path).await? else {
            return Ok(JobsFile::default());
        };
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::schema(self.path.clone(), &e))?;
        migrate(value, &self.path)
    }

    async fn write(&self, file: &mut JobsFile) -> Result<(), StorageError> {
        file.version = JOBS_SCHEMA_VERSION;
        file.updated_at = Utc::now();
        let bytes = serde_json::to_vec_pretty(file)
            .map_err(|e| StorageError::schema(self.path.clone(), &e))?;
        atomic::write_atomic(&self.path, &bytes).await
    }
}

/// Forward-migrate a raw jobs file to the current schema.
fn migrate(mut value: serde_json::Value, path: &Path) -> Result<JobsFile, StorageError> {
    let version = value
        .get("version")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| StorageError::Schema {
            file: path.to_path_buf(),
            field: Some("version".into()),
            message: "missing or non-numeric version".into(),
        })? as u32;

    if version > JOBS_SCHEMA_VERSION {
        return Err(StorageError::Schema {
            file: path.to_path_buf(),
            field: Some("version".into()),
            message: format!("unknown schema version {version} (newer than {JOBS_SCHEMA_VERSION})"),
        });
    }

    // v1 -> v2: introduce planId (unknown for legacy files).
    // v2 -> v3: per-job launchSessionId, absent by default; nothing to
    // rewrite, serde fills None.
    if let Some(obj) = value.as_object_mut() {
        if version < 2 && !obj.contains_key("planId") {
            obj.insert("planId".into(), serde_json::Value::Null);
        }
        obj.insert("version".into(), serde_json::json!(JOBS_SCHEMA_VERSION));
    }

    serde_json::from_value(value).map_err(|e| StorageError::schema(path.clone(), &e))
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;

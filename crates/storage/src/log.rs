// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only logs and the status rate limiter.
//!
//! `completed-jobs.log` is written by multiplexer pane-died hooks (one
//! job id per line) and read by the monitor to catch exits between
//! polls. `last-status-time` holds an ISO timestamp for the auto-status
//! rate limiter.

use crate::error::StorageError;
use crate::paths::DataDir;
use chrono::{DateTime, Utc};
use std::io::Write as _;

/// Append a job id to the completed-jobs log.
///
/// Synchronous on purpose: this is called from hook shell one-liners
/// and failure is swallowed by the caller.
pub fn append_completed_job(data: &DataDir, job_id: &str) -> Result<(), StorageError> {
    let path = data.completed_jobs_log();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StorageError::io(path.clone(), e))?;
    writeln!(file, "{job_id}").map_err(|e| StorageError::io(path, e))
}

/// Job ids appended since the log was last drained.
pub fn read_completed_jobs(data: &DataDir) -> Result<Vec<String>, StorageError> {
    let path = data.completed_jobs_log();
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Truncate the completed-jobs log after its entries are consumed.
pub fn drain_completed_jobs(data: &DataDir) -> Result<Vec<String>, StorageError> {
    let ids = read_completed_jobs(data)?;
    if !ids.is_empty() {
        let path = data.completed_jobs_log();
        std::fs::write(&path, b"").map_err(|e| StorageError::io(path, e))?;
    }
    Ok(ids)
}

/// Record when the auto-status line last fired.
pub fn write_last_status_time(data: &DataDir, at: DateTime<Utc>) -> Result<(), StorageError> {
    let path = data.last_status_path();
    std::fs::write(&path, at.to_rfc3339()).map_err(|e| StorageError::io(path, e))
}

pub fn read_last_status_time(data: &DataDir) -> Result<Option<DateTime<Utc>>, StorageError> {
    let path = data.last_status_path();
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(DateTime::parse_from_rfc3339(content.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;

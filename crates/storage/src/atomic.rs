// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic file writes and per-file locking.
//!
//! Writes land in a sibling `*.tmp`, are fsynced, then renamed over the
//! target, so a crash leaves either the old file or the new one, never
//! a partial. The lock registry hands out one async mutex per path;
//! callers hold it across the whole read-modify-write cycle, not just
//! the write.

use crate::error::StorageError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write `bytes` to `path` atomically (tmp + fsync + rename).
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent.to_path_buf(), e))?;
    }

    let tmp = tmp_path(path);

    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| StorageError::io(tmp.clone(), e))?;
    tokio::io::AsyncWriteExt::write_all(&mut file, bytes)
        .await
        .map_err(|e| StorageError::io(tmp.clone(), e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io(tmp.clone(), e))?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::io(path.to_path_buf(), e))?;
    Ok(())
}

/// Read `path` if it exists, dropping any stale `*.tmp` left by a crash.
pub async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    let tmp = tmp_path(path);
    if tokio::fs::try_exists(&tmp).await.unwrap_or(false) {
        tracing::warn!(path = %tmp.display(), "removing stale temp file");
        let _ = tokio::fs::remove_file(&tmp).await;
    }

    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path.to_path_buf(), e)),
    }
}

/// Remove `path` if present (idempotent).
pub async fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path.to_path_buf(), e)),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Registry of per-file async mutexes.
///
/// Cloning shares the registry; two stores built from the same locks
/// serialize against each other on the same path.
#[derive(Clone, Default)]
pub struct FileLocks {
    inner: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `path`, created on first use.
    pub fn for_path(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;

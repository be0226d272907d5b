// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-stream port allocation (`port.lock`).
//!
//! The lock file is a JSON array of reserved ports. A corrupt file is
//! treated as empty (worst case: a port collides and the agent fails to
//! bind, which surfaces as a launch error).

use crate::atomic::{self, FileLocks};
use crate::error::StorageError;
use crate::paths::DataDir;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct PortAllocator {
    path: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl PortAllocator {
    pub fn new(data: &DataDir, locks: &FileLocks) -> Self {
        let path = data.port_lock_path();
        let lock = locks.for_path(&path);
        Self { path, lock }
    }

    /// Reserve the first free port in `range`, skipping ports already
    /// assigned to `active` jobs and entries in the lock file.
    pub async fn allocate(
        &self,
        range: std::ops::RangeInclusive<u16>,
        active: &[u16],
    ) -> Result<u16, StorageError> {
        let _guard = self.lock.lock().await;
        let mut reserved = self.read().await;
        let (start, end) = (*range.start(), *range.end());

        for port in range {
            if reserved.contains(&port) || active.contains(&port) {
                continue;
            }
            reserved.insert(port);
            self.write(&reserved).await?;
            return Ok(port);
        }

        Err(StorageError::PortRangeExhausted { start, end })
    }

    /// Return a port to the pool (idempotent).
    pub async fn release(&self, port: u16) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut reserved = self.read().await;
        if reserved.remove(&port) {
            self.write(&reserved).await?;
        }
        Ok(())
    }

    async fn read(&self) -> BTreeSet<u16> {
        match atomic::read_if_exists(&self.path).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "corrupt port lock file, treating as empty"
                );
                BTreeSet::new()
            }),
            _ => BTreeSet::new(),
        }
    }

    async fn write(&self, reserved: &BTreeSet<u16>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(reserved)
            .map_err(|e| StorageError::schema(self.path.clone(), &e))?;
        atomic::write_atomic(&self.path, &bytes).await
    }
}

#[cfg(test)]
#[path = "ports_tests.rs"]
mod tests;

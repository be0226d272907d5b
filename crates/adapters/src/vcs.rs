// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! VCS CLI adapter (`gh`) for pull-request creation.

use crate::subprocess::{self, SubprocessError, VCS_TIMEOUT};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("{program} not found: install it and run `{program} auth login`")]
    Missing { program: String },

    #[error("{program} pr create failed: {stderr}")]
    Failed { program: String, stderr: String },

    #[error(transparent)]
    Spawn(#[from] SubprocessError),
}

/// Wrapper around the VCS CLI. The binary is configurable for hosts
/// that ship a compatible tool under a different name.
#[derive(Debug, Clone)]
pub struct VcsCli {
    program: String,
}

impl Default for VcsCli {
    fn default() -> Self {
        Self {
            program: "gh".into(),
        }
    }
}

impl VcsCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the CLI is on PATH.
    pub async fn available(&self) -> bool {
        subprocess::run(&self.program, &["--version"], None)
            .await
            .map(|o| o.success())
            .unwrap_or(false)
    }

    /// Create a pull request; returns the PR URL printed on stdout.
    pub async fn pr_create(
        &self,
        dir: &Path,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String, VcsError> {
        if !self.available().await {
            return Err(VcsError::Missing {
                program: self.program.clone(),
            });
        }

        let out = subprocess::run_with_timeout(
            &self.program,
            &[
                "pr", "create", "--head", head, "--base", base, "--title", title, "--body", body,
            ],
            Some(dir),
            VCS_TIMEOUT,
        )
        .await?;

        if !out.success() {
            return Err(VcsError::Failed {
                program: self.program.clone(),
                stderr: out.combined(),
            });
        }
        Ok(out.stdout.trim().to_string())
    }
}

#[cfg(test)]
#[path = "vcs_tests.rs"]
mod tests;

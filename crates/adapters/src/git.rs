// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git adapter.
//!
//! Wraps the `git` CLI bound to one repository directory. Plumbing
//! queries error on nonzero exit; merge operations return the raw
//! [`CommandOutput`] because the caller interprets conflicts and drives
//! rollback.

use crate::subprocess::{self, CommandOutput, SubprocessError, GIT_TIMEOUT};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error(transparent)]
    Spawn(#[from] SubprocessError),

    #[error("git {command} failed in {}: {stderr}", .dir.display())]
    Command {
        command: String,
        dir: PathBuf,
        stderr: String,
    },
}

/// Git operations against a single working directory.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run git, requiring exit 0; returns trimmed stdout.
    async fn git(&self, args: &[&str]) -> Result<String, GitError> {
        let out = self.git_raw(args).await?;
        if !out.success() {
            return Err(GitError::Command {
                command: args.join(" "),
                dir: self.dir.clone(),
                stderr: out.combined(),
            });
        }
        Ok(out.stdout.trim().to_string())
    }

    /// Run git, returning the raw output whatever the exit code.
    async fn git_raw(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        Ok(subprocess::run_with_timeout("git", args, Some(&self.dir), GIT_TIMEOUT).await?)
    }

    pub async fn rev_parse_head(&self) -> Result<String, GitError> {
        self.git(&["rev-parse", "HEAD"]).await
    }

    pub async fn rev_parse(&self, refspec: &str) -> Result<String, GitError> {
        self.git(&["rev-parse", refspec]).await
    }

    pub async fn current_branch(&self) -> Result<String, GitError> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// Files changed on `head` relative to the merge base with `base`
    /// (`git diff --name-only base...head`).
    pub async fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>, GitError> {
        let range = format!("{base}...{head}");
        let out = self.git(&["diff", "--name-only", &range]).await?;
        Ok(out.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
    }

    pub async fn status_porcelain(&self) -> Result<String, GitError> {
        self.git(&["status", "--porcelain"]).await
    }

    pub async fn merge_squash(&self, branch: &str) -> Result<CommandOutput, GitError> {
        self.git_raw(&["merge", "--squash", branch]).await
    }

    pub async fn merge_no_ff(
        &self,
        branch: &str,
        message: &str,
    ) -> Result<CommandOutput, GitError> {
        self.git_raw(&["merge", "--no-ff", "-m", message, branch]).await
    }

    /// Trial merge: stage the merge without committing.
    pub async fn merge_no_commit(&self, branch: &str) -> Result<CommandOutput, GitError> {
        self.git_raw(&["merge", "--no-commit", "--no-ff", branch]).await
    }

    /// Best effort; fails quietly when no merge is in progress.
    pub async fn merge_abort(&self) {
        let _ = self.git_raw(&["merge", "--abort"]).await;
    }

    pub async fn commit(&self, message: &str) -> Result<CommandOutput, GitError> {
        self.git_raw(&["commit", "--no-verify", "-m", message]).await
    }

    pub async fn reset_hard(&self, commit: &str) -> Result<(), GitError> {
        self.git(&["reset", "--hard", commit]).await.map(|_| ())
    }

    pub async fn clean_fd(&self) -> Result<(), GitError> {
        self.git(&["clean", "-fd"]).await.map(|_| ())
    }

    pub async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.git(&["checkout", branch]).await.map(|_| ())
    }

    pub async fn create_branch(&self, name: &str, start_point: &str) -> Result<(), GitError> {
        self.git(&["branch", name, start_point]).await.map(|_| ())
    }

    pub async fn delete_branch(&self, name: &str) {
        let _ = self.git_raw(&["branch", "-D", name]).await;
    }

    /// Create a worktree on a new branch.
    pub async fn worktree_add(
        &self,
        path: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), GitError> {
        let path_str = path.to_string_lossy();
        self.git(&["worktree", "add", "-b", branch, &path_str, start_point])
            .await
            .map(|_| ())
    }

    /// Remove a worktree; forced, best effort on the prune.
    pub async fn worktree_remove(&self, path: &Path) -> Result<(), GitError> {
        let path_str = path.to_string_lossy();
        let out = self
            .git_raw(&["worktree", "remove", "--force", &path_str])
            .await?;
        if !out.success() {
            return Err(GitError::Command {
                command: format!("worktree remove {path_str}"),
                dir: self.dir.clone(),
                stderr: out.combined(),
            });
        }
        let _ = self.git_raw(&["worktree", "prune"]).await;
        Ok(())
    }

    pub async fn push(&self, remote: &str, branch: &str) -> Result<CommandOutput, GitError> {
        self.git_raw(&["push", "-u", remote, branch]).await
    }

    pub async fn log_oneline(&self, limit: u32) -> Result<Vec<String>, GitError> {
        let n = format!("-{limit}");
        let out = self.git(&["log", &n, "--pretty=%s"]).await?;
        Ok(out.lines().map(str::to_string).collect())
    }
}

/// Extract conflicted paths from merge output.
///
/// Matches lines of the form `CONFLICT (<kind>): Merge conflict in
/// <path>` (the `Merge conflict in` prefix is optional for non-content
/// conflicts). Paths are deduplicated and sorted.
pub fn parse_conflicts(output: &str) -> Vec<String> {
    let mut files = BTreeSet::new();
    for line in output.lines() {
        let line = line.trim();
        if !line.starts_with("CONFLICT") {
            continue;
        }
        let Some((_, tail)) = line.split_once("): ") else {
            continue;
        };
        let path = tail.strip_prefix("Merge conflict in ").unwrap_or(tail);
        let path = path.trim();
        if !path.is_empty() {
            files.insert(path.to_string());
        }
    }
    files.into_iter().collect()
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge train: serialized branch integration with test gating.
//!
//! One branch at a time is folded into the integration worktree, the
//! project's tests run, and any failure rolls the worktree back to the
//! pre-merge snapshot. The worktree is mutated nowhere else.

use chrono::{DateTime, Utc};
use mc_adapters::git::parse_conflicts;
use mc_adapters::{subprocess, Git, GitError};
use mc_core::{Clock, Config, MergeStrategy};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

/// Well-known lockfiles and their canonical install commands.
const LOCKFILE_INSTALLS: &[(&str, &str)] = &[
    ("package-lock.json", "npm install"),
    ("yarn.lock", "yarn install"),
    ("pnpm-lock.yaml", "pnpm install"),
    ("bun.lockb", "bun install"),
];

/// Directory the install commands populate.
const DEPENDENCY_DIR: &str = "node_modules";

/// A branch queued for integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub id: String,
    pub name: String,
    pub branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of the dependency-install step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupReport {
    pub status: TestStatus,
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl SetupReport {
    fn skipped() -> Self {
        Self {
            status: TestStatus::Skipped,
            commands: Vec::new(),
            output: None,
        }
    }
}

/// Structured result of the post-merge test gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeTestReport {
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub setup: SetupReport,
}

impl MergeTestReport {
    fn skipped(reason: &str) -> Self {
        Self {
            status: TestStatus::Skipped,
            command: None,
            output: None,
            timed_out: false,
            reason: Some(reason.to_string()),
            setup: SetupReport::skipped(),
        }
    }
}

/// Outcome of one merge-train item.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Merged {
        merged_at: DateTime<Utc>,
        test_report: MergeTestReport,
    },
    Conflict {
        files: Vec<String>,
    },
    TestFailure {
        output: String,
        test_report: MergeTestReport,
    },
}

impl MergeOutcome {
    pub fn success(&self) -> bool {
        matches!(self, MergeOutcome::Merged { .. })
    }
}

/// Merge-train tuning, extracted from the user config.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub strategy: MergeStrategy,
    pub test_command: Option<String>,
    pub setup_commands: Vec<String>,
    pub test_timeout: Duration,
}

impl From<&Config> for TrainConfig {
    fn from(config: &Config) -> Self {
        Self {
            strategy: config.merge_strategy,
            test_command: config.test_command.clone(),
            setup_commands: config.setup_commands.clone(),
            test_timeout: Duration::from_millis(config.test_timeout_ms),
        }
    }
}

/// FIFO merge pipeline over one integration worktree.
pub struct MergeTrain<C: Clock> {
    git: Git,
    config: TrainConfig,
    clock: C,
    queue: VecDeque<JobSpec>,
}

impl<C: Clock> MergeTrain<C> {
    /// `worktree` is the integration worktree created from
    /// `baseBranch@baseCommit`.
    pub fn new(worktree: &Path, config: TrainConfig, clock: C) -> Self {
        Self {
            git: Git::new(worktree),
            config,
            clock,
            queue: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, job: JobSpec) {
        self.queue.push_back(job);
    }

    /// Snapshot of the queue.
    pub fn queue(&self) -> Vec<JobSpec> {
        self.queue.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn has_work(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Trial-merge a branch without committing; the worktree is always
    /// restored whatever the outcome. Returns conflicting files, empty
    /// when mergeable.
    pub async fn trial_merge(&self, branch: &str) -> Result<Vec<String>, GitError> {
        let snapshot = self.git.rev_parse_head().await?;
        let out = self.git.merge_no_commit(branch).await?;
        let conflicts = if out.success() {
            Vec::new()
        } else {
            let files = parse_conflicts(&out.combined());
            // Merge output without the marker still means failure.
            if files.is_empty() {
                vec![branch.to_string()]
            } else {
                files
            }
        };
        self.rollback(&snapshot).await;
        Ok(conflicts)
    }

    /// Merge, install, test, and roll back on failure. Strictly
    /// sequential: nothing else mutates the integration worktree.
    pub async fn process_next(&mut self) -> Result<Option<(JobSpec, MergeOutcome)>, GitError> {
        let Some(job) = self.queue.pop_front() else {
            return Ok(None);
        };
        let outcome = self.process(&job).await?;
        Ok(Some((job, outcome)))
    }

    /// Drain the queue, collecting each item's outcome.
    pub async fn process_all(&mut self) -> Result<Vec<(JobSpec, MergeOutcome)>, GitError> {
        let mut results = Vec::new();
        while let Some(result) = self.process_next().await? {
            results.push(result);
        }
        Ok(results)
    }

    async fn process(&self, job: &JobSpec) -> Result<MergeOutcome, GitError> {
        let snapshot = self.git.rev_parse_head().await?;
        let commit_message = format!("Merge {}", job.name);

        // ff-only degrades to squash: the integration branch must
        // accumulate merge commits to be pushable as one unit.
        let merge_out = match self.config.strategy {
            MergeStrategy::Squash | MergeStrategy::FfOnly => {
                let out = self.git.merge_squash(&job.branch).await?;
                if out.success() {
                    let commit = self.git.commit(&commit_message).await?;
                    if commit.success() || commit.combined().contains("nothing to commit") {
                        out
                    } else {
                        commit
                    }
                } else {
                    out
                }
            }
            MergeStrategy::Merge => self.git.merge_no_ff(&job.branch, &commit_message).await?,
        };

        if !merge_out.success() {
            let files = parse_conflicts(&merge_out.combined());
            self.rollback(&snapshot).await;
            return Ok(MergeOutcome::Conflict {
                files: if files.is_empty() {
                    vec![job.branch.clone()]
                } else {
                    files
                },
            });
        }

        // No test command anywhere: merged, gate skipped.
        let Some(test_command) = self.resolve_test_command() else {
            return Ok(MergeOutcome::Merged {
                merged_at: self.clock.now(),
                test_report: MergeTestReport::skipped("no test command configured"),
            });
        };

        let setup = self.ensure_dependencies().await;
        if setup.status == TestStatus::Failed {
            let output = setup.output.clone().unwrap_or_default();
            self.rollback(&snapshot).await;
            return Ok(MergeOutcome::TestFailure {
                output,
                test_report: MergeTestReport {
                    status: TestStatus::Skipped,
                    command: Some(test_command),
                    output: None,
                    timed_out: false,
                    reason: Some("dependency setup failed".into()),
                    setup,
                },
            });
        }

        let test_out = match subprocess::run_shell(
            &test_command,
            Some(self.git.dir()),
            self.config.test_timeout,
        )
        .await
        {
            Ok(out) => out,
            Err(e) => {
                self.rollback(&snapshot).await;
                return Ok(MergeOutcome::TestFailure {
                    output: e.to_string(),
                    test_report: MergeTestReport {
                        status: TestStatus::Failed,
                        command: Some(test_command),
                        output: Some(e.to_string()),
                        timed_out: false,
                        reason: Some("test command failed to start".into()),
                        setup,
                    },
                });
            }
        };

        if !test_out.success() {
            let output = test_out.combined();
            self.rollback(&snapshot).await;
            return Ok(MergeOutcome::TestFailure {
                output: output.clone(),
                test_report: MergeTestReport {
                    status: TestStatus::Failed,
                    command: Some(test_command),
                    output: Some(output),
                    timed_out: test_out.timed_out,
                    reason: None,
                    setup,
                },
            });
        }

        Ok(MergeOutcome::Merged {
            merged_at: self.clock.now(),
            test_report: MergeTestReport {
                status: TestStatus::Passed,
                command: Some(test_command),
                output: None,
                timed_out: false,
                reason: None,
                setup,
            },
        })
    }

    /// Explicit config wins; otherwise `scripts.test` in the
    /// integration worktree's `package.json`.
    fn resolve_test_command(&self) -> Option<String> {
        if let Some(cmd) = &self.config.test_command {
            return Some(cmd.clone());
        }
        let manifest = self.git.dir().join("package.json");
        let raw = std::fs::read_to_string(manifest).ok()?;
        let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
        value
            .pointer("/scripts/test")
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    /// Run configured setup commands, or infer an install from the
    /// lockfile when the dependency directory is missing.
    async fn ensure_dependencies(&self) -> SetupReport {
        let dir = self.git.dir();

        if !self.config.setup_commands.is_empty() {
            let mut outputs = Vec::new();
            for command in &self.config.setup_commands {
                match subprocess::run_shell(command, Some(dir), self.config.test_timeout).await {
                    Ok(out) if out.success() => outputs.push(out.combined()),
                    Ok(out) => {
                        return SetupReport {
                            status: TestStatus::Failed,
                            commands: self.config.setup_commands.clone(),
                            output: Some(out.combined()),
                        };
                    }
                    Err(e) => {
                        return SetupReport {
                            status: TestStatus::Failed,
                            commands: self.config.setup_commands.clone(),
                            output: Some(e.to_string()),
                        };
                    }
                }
            }
            return SetupReport {
                status: TestStatus::Passed,
                commands: self.config.setup_commands.clone(),
                output: Some(outputs.join("\n")).filter(|o| !o.trim().is_empty()),
            };
        }

        let Some(install) = detect_install_command(dir) else {
            return SetupReport::skipped();
        };

        let deps = dir.join(DEPENDENCY_DIR);
        if deps.is_symlink() && !deps.exists() {
            // Dangling symlink from a copied setup; replace it.
            let _ = std::fs::remove_file(&deps);
        }
        if deps.exists() {
            return SetupReport::skipped();
        }

        match subprocess::run_shell(&install, Some(dir), self.config.test_timeout).await {
            Ok(out) if out.success() => SetupReport {
                status: TestStatus::Passed,
                commands: vec![install],
                output: None,
            },
            Ok(out) => SetupReport {
                status: TestStatus::Failed,
                commands: vec![install],
                output: Some(out.combined()),
            },
            Err(e) => SetupReport {
                status: TestStatus::Failed,
                commands: vec![install],
                output: Some(e.to_string()),
            },
        }
    }

    /// Restore the worktree to the pre-merge snapshot: abort any
    /// half-done merge, reset, drop untracked files.
    async fn rollback(&self, snapshot: &str) {
        self.git.merge_abort().await;
        if let Err(e) = self.git.reset_hard(snapshot).await {
            tracing::error!(error = %e, "rollback reset failed");
        }
        if let Err(e) = self.git.clean_fd().await {
            tracing::error!(error = %e, "rollback clean failed");
        }
    }
}

/// Install command implied by the first matching lockfile.
pub fn detect_install_command(dir: &Path) -> Option<String> {
    LOCKFILE_INSTALLS
        .iter()
        .find(|(lockfile, _)| dir.join(lockfile).exists())
        .map(|(_, install)| install.to_string())
}

#[cfg(test)]
#[path = "train_tests.rs"]
mod tests;

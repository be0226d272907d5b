// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide user configuration.
//!
//! Loaded from a TOML file and merged over defaults: every field is
//! optional in the file. Loading clamps `poll_interval_ms` to the
//! 10-second floor; directly constructed configs (tests) are taken
//! as-is.

use crate::launched::Placement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Floor for pane polling outside tests.
pub const MIN_POLL_INTERVAL_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// How a completed branch is folded into the integration branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// `merge --squash` plus a synthesized commit.
    #[default]
    Squash,
    /// Degrades to squash inside the train; the integration branch must
    /// accumulate merges.
    FfOnly,
    /// `merge --no-ff` with a merge commit.
    Merge,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Squash => write!(f, "squash"),
            MergeStrategy::FfOnly => write!(f, "ff-only"),
            MergeStrategy::Merge => write!(f, "merge"),
        }
    }
}

/// Response to an agent permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPolicy {
    Allow,
    /// Relay to the user as a question.
    #[default]
    Prompt,
    Deny,
}

/// Post-create hook applied to each new job worktree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorktreeSetup {
    /// Files copied from the source repo into the worktree.
    pub copy_files: Vec<String>,
    /// Directories symlinked from the source repo (joined with the
    /// built-in list, e.g. the agent's config directory).
    pub symlink_dirs: Vec<String>,
    /// Shell commands run inside the new worktree.
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub default_placement: Placement,
    /// Pane poll cadence in milliseconds.
    pub poll_interval_ms: u64,
    /// Unchanged-output window before an idle pane counts as complete.
    pub idle_threshold_ms: u64,
    /// Parent directory for job worktrees; defaults to the data dir.
    pub worktree_base_path: Option<PathBuf>,
    /// In-flight job bound.
    pub max_parallel: usize,
    pub auto_commit: bool,
    /// Test command run after each merge; falls back to
    /// `package.json` `scripts.test` when unset.
    pub test_command: Option<String>,
    /// Commands preparing the integration worktree before tests; when
    /// empty, dependency install is inferred from the lockfile.
    pub setup_commands: Vec<String>,
    pub test_timeout_ms: u64,
    pub merge_strategy: MergeStrategy,
    pub worktree_setup: WorktreeSetup,
    pub port_range_start: u16,
    pub port_range_end: u16,
    pub default_permission_policy: PermissionPolicy,
    /// Prefix for derived job branches (`<prefix>/<name>`).
    pub branch_prefix: String,
    /// Agent model identifier passed to the launcher.
    pub model: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_placement: Placement::Session,
            poll_interval_ms: 10_000,
            idle_threshold_ms: 300_000,
            worktree_base_path: None,
            max_parallel: 3,
            auto_commit: true,
            test_command: None,
            setup_commands: Vec::new(),
            test_timeout_ms: 600_000,
            merge_strategy: MergeStrategy::Squash,
            worktree_setup: WorktreeSetup::default(),
            port_range_start: 14_100,
            port_range_end: 14_199,
            default_permission_policy: PermissionPolicy::Prompt,
            branch_prefix: "mc".into(),
            model: None,
        }
    }
}

impl Config {
    /// Load from a TOML file, merging over defaults. A missing file
    /// yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.clamped())
    }

    /// Enforce floors on loaded values.
    fn clamped(mut self) -> Self {
        self.poll_interval_ms = self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS);
        self
    }

    /// The active agent model, or the built-in default.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn port_range(&self) -> std::ops::RangeInclusive<u16> {
        self.port_range_start..=self.port_range_end
    }
}

/// Model used when the config does not name one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

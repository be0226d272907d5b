// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use mc_core::GraphError;
use thiserror::Error;

/// Errors from the orchestration engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// User-supplied plan is invalid; nothing was persisted.
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] GraphError),

    #[error("no active plan")]
    NoPlan,

    #[error("a plan is already active: {0}")]
    PlanExists(String),

    #[error("job {0} not found in plan")]
    UnknownJob(String),

    /// Missing or misconfigured environment; remediation in message.
    #[error("environment: {0}")]
    Environment(String),

    #[error("checkpoint mismatch: expected {expected}, got {got}")]
    CheckpointMismatch { expected: String, got: String },

    #[error("no checkpoint is set")]
    NoCheckpoint,

    #[error("retry and relaunch are mutually exclusive")]
    RetryRelaunchConflict,

    #[error("job {job} is {status}; only failed, conflict, or needs_rebase jobs can be retried")]
    NotRetryable { job: String, status: String },

    #[error("touch-set still violated by {job}: {files:?}")]
    TouchSetStillViolated { job: String, files: Vec<String> },

    #[error(transparent)]
    Storage(#[from] mc_storage::StorageError),

    #[error(transparent)]
    Git(#[from] mc_adapters::GitError),

    #[error("multiplexer: {0}")]
    Multiplexer(#[from] mc_adapters::MultiplexerError),

    #[error(transparent)]
    Spawn(#[from] crate::spawn::SpawnError),

    #[error("pull request creation failed: {0}")]
    Vcs(#[from] mc_adapters::VcsError),

    #[error("touch-set pattern: {0}")]
    TouchSet(#[from] mc_core::touchset::PatternError),
}

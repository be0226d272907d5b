// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mc-engine: Orchestration kernel for Mission Control
//!
//! The moving parts: the job monitor watches running agents and emits
//! semantic events; the merge train folds finished branches into the
//! integration worktree behind a test gate; the orchestrator drives the
//! plan state machine through periodic reconciliation; the notifier
//! turns events into chat messages.

pub mod error;
pub mod monitor;
pub mod notifier;
pub mod orchestrator;
pub mod registry;
pub mod spawn;
pub mod train;

pub use error::EngineError;
pub use monitor::{JobMonitor, MonitorConfig};
pub use notifier::Notifier;
pub use orchestrator::{
    render_pr_body, ApproveArgs, JobSpecInput, Orchestrator, OrchestratorDeps, PlanSpec,
    ReconcileOutcome,
};
pub use registry::Registry;
pub use spawn::{launch_job, SpawnError, SpawnRequest};
pub use train::{
    JobSpec, MergeOutcome, MergeTestReport, MergeTrain, SetupReport, TestStatus, TrainConfig,
};

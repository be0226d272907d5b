// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide component registry.
//!
//! One registry per host process wires the monitor, orchestrator, and
//! notifier together at startup; no hidden globals. Teardown aborts
//! every background task the registry started.

use crate::monitor::{JobMonitor, MonitorConfig};
use crate::notifier::Notifier;
use crate::orchestrator::{Orchestrator, OrchestratorDeps, PlanSpec};
use crate::EngineError;
use mc_adapters::{ChatAdapter, Git, MultiplexerAdapter, VcsCli};
use mc_core::{Clock, Config, Plan};
use mc_storage::{DataDir, FileLocks, PlanStore, ReportStore};
use parking_lot::Mutex;

/// Everything a host process needs to run Mission Control.
pub struct Registry<M: MultiplexerAdapter, Ch: ChatAdapter, C: Clock> {
    pub monitor: JobMonitor<M, C>,
    pub orchestrator: Orchestrator<M, Ch, C>,
    pub notifier: Notifier<Ch>,
    notifier_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<M: MultiplexerAdapter, Ch: ChatAdapter, C: Clock> Registry<M, Ch, C> {
    /// Construct and wire the components. Nothing runs yet; call
    /// [`Registry::start`].
    pub fn new(
        mux: M,
        chat: Ch,
        clock: C,
        repo: Git,
        data: DataDir,
        config: Config,
    ) -> Result<Self, EngineError> {
        data.ensure()?;
        let locks = FileLocks::new();
        let monitor = JobMonitor::new(
            mux.clone(),
            clock.clone(),
            ReportStore::new(&data),
            MonitorConfig::from(&config),
        );
        let notifier = Notifier::new(chat, PlanStore::new(&data, &locks));
        let orchestrator = Orchestrator::new(OrchestratorDeps {
            mux,
            clock,
            repo,
            data,
            config,
            monitor: monitor.clone(),
            notifier: notifier.clone(),
            vcs: VcsCli::default(),
        });
        Ok(Self {
            monitor,
            orchestrator,
            notifier,
            notifier_task: Mutex::new(None),
        })
    }

    /// Start background machinery: event fan-out to the notifier and
    /// the orchestrator, the monitor poll loop, and a resume of any
    /// live plan from a previous process.
    pub async fn start(&self) -> Result<Option<Plan>, EngineError> {
        let notifier = self.notifier.clone();
        let rx = self.monitor.subscribe();
        *self.notifier_task.lock() = Some(tokio::spawn(notifier.run(rx)));

        self.orchestrator.attach_events();
        self.monitor.start();

        let resumed = self.orchestrator.resume_plan().await?;
        if resumed.is_some() {
            self.orchestrator.start_loop();
        }
        Ok(resumed)
    }

    /// Create a plan and begin reconciling it.
    pub async fn start_plan(&self, spec: PlanSpec) -> Result<Plan, EngineError> {
        let plan = self.orchestrator.start_plan(spec).await?;
        self.orchestrator.start_loop();
        self.orchestrator.wake();
        Ok(plan)
    }

    /// Abort all subscriptions and timers.
    pub fn teardown(&self) {
        self.orchestrator.shutdown();
        self.monitor.stop();
        if let Some(task) = self.notifier_task.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

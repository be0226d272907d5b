// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event fan-out with deduplication.
//!
//! Each subscriber gets its own FIFO queue, so per-subscriber ordering
//! matches emission order and a slow handler never blocks the monitor.
//! Dedup keys live for the emitter's lifetime; `reset` clears them.

use mc_core::JobEvent;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct EmitterState {
    seen: HashSet<String>,
    subscribers: Vec<mpsc::UnboundedSender<JobEvent>>,
}

/// Deduplicating event fan-out.
#[derive(Clone, Default)]
pub struct Emitter {
    inner: Arc<Mutex<EmitterState>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; events arrive in emission order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<JobEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().subscribers.push(tx);
        rx
    }

    /// Emit once per dedup key; re-emissions are dropped.
    /// Returns whether the event was delivered.
    pub fn emit(&self, event: JobEvent) -> bool {
        let mut inner = self.inner.lock();
        if !inner.seen.insert(event.dedup_key()) {
            return false;
        }
        tracing::debug!(event = %event.log_summary(), "emitting");
        // Dead subscribers are dropped on the way through.
        inner
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
        true
    }

    /// Forget dedup history and subscribers (monitor stop).
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.seen.clear();
        inner.subscribers.clear();
    }
}

#[cfg(test)]
#[path = "emitter_tests.rs"]
mod tests;

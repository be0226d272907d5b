// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of wall-clock time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;

    /// Current instant as a UTC timestamp.
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.epoch_ms() as i64)
            .single()
            .unwrap_or_default()
    }
}

/// System clock for production use
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually advanced clock for tests
#[derive(Clone)]
pub struct FakeClock {
    epoch_ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new(epoch_ms: u64) -> Self {
        Self {
            epoch_ms: Arc::new(AtomicU64::new(epoch_ms)),
        }
    }

    /// Advance the clock by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.epoch_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, epoch_ms: u64) {
        self.epoch_ms.store(epoch_ms, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(1_700_000_000_000)
    }
}

impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        self.epoch_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane tail classification.
//!
//! The fallback observation mode: capture the tail of the agent's pane
//! and classify it by fixed substring heuristics. Fragile by nature,
//! which is why the agent report file and the event stream both take
//! priority over it.

use std::hash::{DefaultHasher, Hash, Hasher};

/// Coarse state read off a pane tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneState {
    /// Sitting at the agent's idle prompt.
    Idle,
    /// Output is actively streaming.
    Streaming,
    /// Showing an interactive picker or prompt.
    AwaitingInput,
    Unknown,
}

/// Classify a captured pane tail.
///
/// The awaiting-input markers win over the streaming markers: a picker
/// is drawn on top of whatever was streaming before it.
pub fn classify_tail(tail: &str) -> PaneState {
    if tail.contains("↑↓ select") || tail.contains("enter submit") || tail.contains("esc dismiss")
    {
        return PaneState::AwaitingInput;
    }
    if tail.contains("⬝") || tail.contains("esc interrupt") {
        return PaneState::Streaming;
    }
    if tail.contains("ctrl+p commands") {
        return PaneState::Idle;
    }
    PaneState::Unknown
}

/// Stable hash of a pane capture, for change detection between polls.
pub fn hash_tail(tail: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    tail.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
#[path = "pane_tests.rs"]
mod tests;

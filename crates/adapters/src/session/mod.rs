// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal multiplexer adapters

mod tmux;

pub use tmux::TmuxAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMultiplexer, FakePane, MultiplexerCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from multiplexer operations
#[derive(Debug, Error)]
pub enum MultiplexerError {
    #[error("target not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
    /// Window placement outside a multiplexer; remediation hint included.
    #[error("not inside a multiplexer: {0}")]
    NotInside(String),
}

/// Adapter for the terminal multiplexer supervising agent panes.
///
/// Targets returned by the spawn methods are opaque strings suitable
/// for every other method (`mc-<name>` for sessions,
/// `<session>:<window>` for windows).
#[async_trait]
pub trait MultiplexerAdapter: Clone + Send + Sync + 'static {
    /// Spawn a detached session running `cmd`; returns the target.
    async fn spawn_session(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
    ) -> Result<String, MultiplexerError>;

    /// Spawn a window in the user's current session; returns the target.
    /// Fails with [`MultiplexerError::NotInside`] when the process is
    /// not running inside the multiplexer.
    async fn spawn_window(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
    ) -> Result<String, MultiplexerError>;

    /// Send literal text to the pane.
    async fn send_keys(&self, target: &str, text: &str) -> Result<(), MultiplexerError>;

    /// Send the Enter key.
    async fn send_enter(&self, target: &str) -> Result<(), MultiplexerError>;

    /// Capture the last `lines` lines of the pane.
    async fn capture_tail(&self, target: &str, lines: u32) -> Result<String, MultiplexerError>;

    async fn is_alive(&self, target: &str) -> Result<bool, MultiplexerError>;

    /// Exit code of the pane's process once it has died; `None` while
    /// still running.
    async fn exit_status(&self, target: &str) -> Result<Option<i32>, MultiplexerError>;

    /// Install a hook command that fires when the pane dies.
    async fn set_pane_died_hook(
        &self,
        target: &str,
        command: &str,
    ) -> Result<(), MultiplexerError>;

    /// Kill the session or window behind `target`.
    async fn kill(&self, target: &str) -> Result<(), MultiplexerError>;

    /// Whether this process is itself running inside the multiplexer.
    fn inside_multiplexer(&self) -> bool;
}

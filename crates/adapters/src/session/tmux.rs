// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux multiplexer adapter

use super::{MultiplexerAdapter, MultiplexerError};
use crate::subprocess::{self, TMUX_TIMEOUT};
use async_trait::async_trait;
use std::path::Path;

/// Tmux-based multiplexer adapter
#[derive(Clone, Default)]
pub struct TmuxAdapter;

impl TmuxAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn tmux(&self, args: &[&str]) -> Result<subprocess::CommandOutput, MultiplexerError> {
        subprocess::run_with_timeout("tmux", args, None, TMUX_TIMEOUT)
            .await
            .map_err(|e| MultiplexerError::CommandFailed(e.to_string()))
    }
}

#[async_trait]
impl MultiplexerAdapter for TmuxAdapter {
    async fn spawn_session(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
    ) -> Result<String, MultiplexerError> {
        if !cwd.exists() {
            return Err(MultiplexerError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        // An earlier session with the same name is stale; kill it first.
        let existing = self.tmux(&["has-session", "-t", name]).await?;
        if existing.success() {
            tracing::warn!(target = name, "session already exists, killing first");
            let _ = self.tmux(&["kill-session", "-t", name]).await;
        }

        let cwd_str = cwd.to_string_lossy();
        let out = self
            .tmux(&["new-session", "-d", "-s", name, "-c", &cwd_str, cmd])
            .await?;
        if !out.success() {
            tracing::error!(target = name, stderr = %out.stderr, "tmux spawn failed");
            return Err(MultiplexerError::SpawnFailed(out.stderr.to_string()));
        }

        // Keep the dead pane around so exit status and final output
        // stay readable until the monitor has seen them.
        let _ = self
            .tmux(&["set-option", "-t", name, "remain-on-exit", "on"])
            .await;

        Ok(name.to_string())
    }

    async fn spawn_window(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
    ) -> Result<String, MultiplexerError> {
        if !self.inside_multiplexer() {
            return Err(MultiplexerError::NotInside(
                "window placement requires running inside tmux; \
                 start tmux or use session placement"
                    .into(),
            ));
        }
        if !cwd.exists() {
            return Err(MultiplexerError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let cwd_str = cwd.to_string_lossy();
        let out = self
            .tmux(&[
                "new-window",
                "-d",
                "-n",
                name,
                "-c",
                &cwd_str,
                "-P",
                "-F",
                "#{session_name}:#{window_index}",
                cmd,
            ])
            .await?;
        if !out.success() {
            return Err(MultiplexerError::SpawnFailed(out.stderr.to_string()));
        }

        let target = out.stdout.trim().to_string();
        let _ = self
            .tmux(&["set-option", "-t", &target, "remain-on-exit", "on"])
            .await;
        Ok(target)
    }

    async fn send_keys(&self, target: &str, text: &str) -> Result<(), MultiplexerError> {
        // -l = literal mode; -- guards text starting with -
        let out = self
            .tmux(&["send-keys", "-t", target, "-l", "--", text])
            .await?;
        if !out.success() {
            return Err(MultiplexerError::NotFound(target.to_string()));
        }
        Ok(())
    }

    async fn send_enter(&self, target: &str) -> Result<(), MultiplexerError> {
        let out = self.tmux(&["send-keys", "-t", target, "Enter"]).await?;
        if !out.success() {
            return Err(MultiplexerError::NotFound(target.to_string()));
        }
        Ok(())
    }

    async fn capture_tail(&self, target: &str, lines: u32) -> Result<String, MultiplexerError> {
        let start = format!("-{lines}");
        let out = self
            .tmux(&["capture-pane", "-t", target, "-p", "-S", &start])
            .await?;
        if !out.success() {
            return Err(MultiplexerError::NotFound(target.to_string()));
        }
        Ok(out.stdout)
    }

    async fn is_alive(&self, target: &str) -> Result<bool, MultiplexerError> {
        // Windows need list-panes; sessions answer to has-session.
        let out = if target.contains(':') {
            self.tmux(&["list-panes", "-t", target]).await?
        } else {
            self.tmux(&["has-session", "-t", target]).await?
        };
        Ok(out.success())
    }

    async fn exit_status(&self, target: &str) -> Result<Option<i32>, MultiplexerError> {
        let out = self
            .tmux(&["display-message", "-t", target, "-p", "#{pane_dead_status}"])
            .await?;
        if !out.success() {
            return Err(MultiplexerError::NotFound(target.to_string()));
        }
        let status = out.stdout.trim();
        if status.is_empty() {
            // Process is still running
            return Ok(None);
        }
        Ok(status.parse::<i32>().ok())
    }

    async fn set_pane_died_hook(
        &self,
        target: &str,
        command: &str,
    ) -> Result<(), MultiplexerError> {
        let hook = format!("run-shell \"{command}\"");
        let out = self
            .tmux(&["set-hook", "-t", target, "pane-died", &hook])
            .await?;
        if !out.success() {
            tracing::warn!(target, stderr = %out.stderr, "pane-died hook install failed");
        }
        Ok(())
    }

    async fn kill(&self, target: &str) -> Result<(), MultiplexerError> {
        let args: &[&str] = if target.contains(':') {
            &["kill-window", "-t", target]
        } else {
            &["kill-session", "-t", target]
        };
        // Target might already be gone, which is fine.
        let _ = self.tmux(args).await?;
        Ok(())
    }

    fn inside_multiplexer(&self) -> bool {
        std::env::var_os("TMUX").is_some()
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake multiplexer adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{MultiplexerAdapter, MultiplexerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded multiplexer call
#[derive(Debug, Clone, PartialEq)]
pub enum MultiplexerCall {
    SpawnSession { name: String, cwd: PathBuf, cmd: String },
    SpawnWindow { name: String, cwd: PathBuf, cmd: String },
    SendKeys { target: String, text: String },
    SendEnter { target: String },
    CaptureTail { target: String, lines: u32 },
    IsAlive { target: String },
    ExitStatus { target: String },
    SetPaneDiedHook { target: String, command: String },
    Kill { target: String },
}

/// Scripted pane state
#[derive(Debug, Clone)]
pub struct FakePane {
    pub name: String,
    pub cwd: PathBuf,
    pub cmd: String,
    pub tail: String,
    pub alive: bool,
    pub exit_status: Option<i32>,
    pub hook: Option<String>,
    pub keys: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    panes: HashMap<String, FakePane>,
    calls: Vec<MultiplexerCall>,
    inside: bool,
    fail_spawn: bool,
}

/// Fake multiplexer adapter for testing
#[derive(Clone, Default)]
pub struct FakeMultiplexer {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<MultiplexerCall> {
        self.inner.lock().calls.clone()
    }

    pub fn pane(&self, target: &str) -> Option<FakePane> {
        self.inner.lock().panes.get(target).cloned()
    }

    pub fn targets(&self) -> Vec<String> {
        self.inner.lock().panes.keys().cloned().collect()
    }

    /// Script the pane's captured tail
    pub fn set_tail(&self, target: &str, tail: &str) {
        if let Some(pane) = self.inner.lock().panes.get_mut(target) {
            pane.tail = tail.to_string();
        }
    }

    /// Mark the pane's process as dead with an exit status
    pub fn set_dead(&self, target: &str, exit_status: i32) {
        if let Some(pane) = self.inner.lock().panes.get_mut(target) {
            pane.alive = false;
            pane.exit_status = Some(exit_status);
        }
    }

    /// Remove the pane entirely (session gone)
    pub fn set_gone(&self, target: &str) {
        self.inner.lock().panes.remove(target);
    }

    pub fn set_inside_multiplexer(&self, inside: bool) {
        self.inner.lock().inside = inside;
    }

    /// Make subsequent spawns fail
    pub fn fail_spawns(&self, fail: bool) {
        self.inner.lock().fail_spawn = fail;
    }

    fn spawn(
        &self,
        target: String,
        name: &str,
        cwd: &Path,
        cmd: &str,
        call: MultiplexerCall,
    ) -> Result<String, MultiplexerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(call);
        if inner.fail_spawn {
            return Err(MultiplexerError::SpawnFailed("scripted failure".into()));
        }
        inner.panes.insert(
            target.clone(),
            FakePane {
                name: name.to_string(),
                cwd: cwd.to_path_buf(),
                cmd: cmd.to_string(),
                tail: String::new(),
                alive: true,
                exit_status: None,
                hook: None,
                keys: Vec::new(),
            },
        );
        Ok(target)
    }
}

#[async_trait]
impl MultiplexerAdapter for FakeMultiplexer {
    async fn spawn_session(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
    ) -> Result<String, MultiplexerError> {
        self.spawn(
            name.to_string(),
            name,
            cwd,
            cmd,
            MultiplexerCall::SpawnSession {
                name: name.to_string(),
                cwd: cwd.to_path_buf(),
                cmd: cmd.to_string(),
            },
        )
    }

    async fn spawn_window(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
    ) -> Result<String, MultiplexerError> {
        if !self.inside_multiplexer() {
            return Err(MultiplexerError::NotInside(
                "window placement requires running inside tmux".into(),
            ));
        }
        self.spawn(
            format!("fake:{name}"),
            name,
            cwd,
            cmd,
            MultiplexerCall::SpawnWindow {
                name: name.to_string(),
                cwd: cwd.to_path_buf(),
                cmd: cmd.to_string(),
            },
        )
    }

    async fn send_keys(&self, target: &str, text: &str) -> Result<(), MultiplexerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MultiplexerCall::SendKeys {
            target: target.to_string(),
            text: text.to_string(),
        });
        match inner.panes.get_mut(target) {
            Some(pane) => {
                pane.keys.push(text.to_string());
                Ok(())
            }
            None => Err(MultiplexerError::NotFound(target.to_string())),
        }
    }

    async fn send_enter(&self, target: &str) -> Result<(), MultiplexerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MultiplexerCall::SendEnter {
            target: target.to_string(),
        });
        match inner.panes.get_mut(target) {
            Some(pane) => {
                pane.keys.push("\n".to_string());
                Ok(())
            }
            None => Err(MultiplexerError::NotFound(target.to_string())),
        }
    }

    async fn capture_tail(&self, target: &str, lines: u32) -> Result<String, MultiplexerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MultiplexerCall::CaptureTail {
            target: target.to_string(),
            lines,
        });
        match inner.panes.get(target) {
            Some(pane) => Ok(pane.tail.clone()),
            None => Err(MultiplexerError::NotFound(target.to_string())),
        }
    }

    async fn is_alive(&self, target: &str) -> Result<bool, MultiplexerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MultiplexerCall::IsAlive {
            target: target.to_string(),
        });
        Ok(inner.panes.get(target).map(|p| p.alive).unwrap_or(false))
    }

    async fn exit_status(&self, target: &str) -> Result<Option<i32>, MultiplexerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MultiplexerCall::ExitStatus {
            target: target.to_string(),
        });
        match inner.panes.get(target) {
            Some(pane) => Ok(pane.exit_status),
            None => Err(MultiplexerError::NotFound(target.to_string())),
        }
    }

    async fn set_pane_died_hook(
        &self,
        target: &str,
        command: &str,
    ) -> Result<(), MultiplexerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MultiplexerCall::SetPaneDiedHook {
            target: target.to_string(),
            command: command.to_string(),
        });
        match inner.panes.get_mut(target) {
            Some(pane) => {
                pane.hook = Some(command.to_string());
                Ok(())
            }
            None => Err(MultiplexerError::NotFound(target.to_string())),
        }
    }

    async fn kill(&self, target: &str) -> Result<(), MultiplexerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MultiplexerCall::Kill {
            target: target.to_string(),
        });
        inner.panes.remove(target);
        Ok(())
    }

    fn inside_multiplexer(&self) -> bool {
        self.inner.lock().inside
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

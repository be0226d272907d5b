// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers.
//!
//! Every invocation captures both stdout and stderr and awaits exit.
//! Timed invocations run the child in its own process group and kill
//! the whole group when the deadline expires, so a test runner's
//! children do not outlive it.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;

/// Default timeout for multiplexer commands.
pub const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for git worktree operations.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for VCS CLI operations (network-bound).
pub const VCS_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of a finished (or killed) subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by signal or timeout.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    /// Stdout and stderr joined, for conflict parsing and error display.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

fn build(program: &str, args: &[&str], cwd: Option<&Path>) -> tokio::process::Command {
    let mut std_cmd = std::process::Command::new(program);
    std_cmd
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        std_cmd.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group so a timeout can kill the whole tree.
        std_cmd.process_group(0);
    }
    let mut cmd = tokio::process::Command::from(std_cmd);
    cmd.kill_on_drop(true);
    cmd
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

/// Run a command to completion with no deadline.
pub async fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<CommandOutput, SubprocessError> {
    let output = build(program, args, cwd)
        .output()
        .await
        .map_err(|source| SubprocessError::Spawn {
            program: program.to_string(),
            source,
        })?;
    Ok(CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        timed_out: false,
    })
}

/// Run a command with a deadline. On expiry the process group is
/// SIGKILLed and the result is marked `timed_out`.
pub async fn run_with_timeout(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, SubprocessError> {
    let mut child = build(program, args, cwd)
        .spawn()
        .map_err(|source| SubprocessError::Spawn {
            program: program.to_string(),
            source,
        })?;
    let pid = child.id();

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            timed_out: false,
        }),
        Ok(Err(source)) => Err(SubprocessError::Spawn {
            program: program.to_string(),
            source,
        }),
        Err(_elapsed) => {
            if let Some(pid) = pid {
                kill_group(pid);
            }
            Ok(CommandOutput {
                code: None,
                stdout: String::new(),
                stderr: format!("{} timed out after {}s", program, timeout.as_secs()),
                timed_out: true,
            })
        }
    }
}

/// Run a shell command line (`sh -c`) with a deadline.
pub async fn run_shell(
    script: &str,
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, SubprocessError> {
    run_with_timeout("sh", &["-c", script], cwd, timeout).await
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;

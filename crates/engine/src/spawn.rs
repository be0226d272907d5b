// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic agent launch.
//!
//! From a plan job to a running agent: derive branch and worktree,
//! apply the post-create hook, write the prompt and launcher, start the
//! multiplexer pane, install the pane-died hook, and record the job.
//! Any failure reverses the partial work best-effort.

use mc_adapters::{subprocess, Git, MultiplexerAdapter};
use mc_core::{Clock, Config, LaunchedJob, Placement};
use mc_storage::{DataDir, JobStore};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directories always symlinked into new worktrees when present in the
/// source repo (agent configuration travels with the job).
const BUILTIN_SYMLINK_DIRS: &[&str] = &[".claude"];

/// Agent CLI invoked by the launcher script.
const AGENT_CLI: &str = "claude";

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("worktree creation failed: {0}")]
    Worktree(#[from] mc_adapters::GitError),

    #[error("multiplexer: {0}")]
    Multiplexer(#[from] mc_adapters::MultiplexerError),

    #[error("worktree setup: {0}")]
    Setup(String),

    #[error(transparent)]
    Storage(#[from] mc_storage::StorageError),

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Inputs for one launch.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub job_id: String,
    pub job_name: String,
    pub prompt: String,
    /// Explicit branch; derived as `<prefix>/<name>` when absent.
    pub branch: Option<String>,
    /// Branch the worktree starts from (the integration branch).
    pub start_point: String,
    pub placement: Placement,
    pub launch_session_id: Option<String>,
    /// Event-stream port, when one was allocated.
    pub port: Option<u16>,
}

/// Keep only `[A-Za-z0-9_-]`, mapping runs of anything else to one dash.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Boilerplate appended to every job prompt: how to report progress and
/// what to do when done.
fn prompt_file_contents(request: &SpawnRequest, report_path: &Path, auto_commit: bool) -> String {
    let mut text = String::new();
    text.push_str(&request.prompt);
    text.push_str("\n\n---\n\n");
    text.push_str(&format!(
        "Write progress reports as JSON to {} with fields jobId, jobName, \
         status (working|progress|blocked|needs_review|completed), message, \
         optional progress (0-100), and timestamp (epoch ms). \
         Use jobId \"{}\" and jobName \"{}\".\n",
        report_path.display(),
        request.job_id,
        request.job_name,
    ));
    if auto_commit {
        text.push_str(
            "Commit your work to the current branch as you go; \
             leave the worktree clean when you finish.\n",
        );
    }
    text.push_str("When the task is complete, write a final report with status \"completed\".\n");
    text
}

fn launcher_contents(model: &str, prompt_path: &Path, port: Option<u16>) -> String {
    let mut script = String::from("#!/usr/bin/env bash\nset -euo pipefail\n");
    if let Some(port) = port {
        script.push_str(&format!("export MC_EVENT_PORT={port}\n"));
    }
    script.push_str(&format!(
        "exec {AGENT_CLI} --model {model} \"$(cat '{}')\"\n",
        prompt_path.display()
    ));
    script
}

fn write_file(path: &Path, contents: &str) -> Result<(), SpawnError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SpawnError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| SpawnError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), SpawnError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|source| {
        SpawnError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), SpawnError> {
    Ok(())
}

/// Copy files and link directories from the source repo, then run the
/// configured setup commands inside the worktree.
async fn apply_worktree_setup(
    source_repo: &Path,
    worktree: &Path,
    config: &Config,
) -> Result<(), SpawnError> {
    for file in &config.worktree_setup.copy_files {
        let from = source_repo.join(file);
        if !from.exists() {
            continue;
        }
        let to = worktree.join(file);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SpawnError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::copy(&from, &to).map_err(|source| SpawnError::Io {
            path: to.clone(),
            source,
        })?;
    }

    let symlinks = BUILTIN_SYMLINK_DIRS
        .iter()
        .map(|s| s.to_string())
        .chain(config.worktree_setup.symlink_dirs.iter().cloned());
    for dir in symlinks {
        let from = source_repo.join(&dir);
        let to = worktree.join(&dir);
        if !from.is_dir() || to.exists() {
            continue;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(&from, &to).map_err(|source| SpawnError::Io {
            path: to.clone(),
            source,
        })?;
    }

    for command in &config.worktree_setup.commands {
        let out = subprocess::run_shell(
            command,
            Some(worktree),
            std::time::Duration::from_millis(config.test_timeout_ms),
        )
        .await
        .map_err(|e| SpawnError::Setup(e.to_string()))?;
        if !out.success() {
            return Err(SpawnError::Setup(format!(
                "`{command}` failed: {}",
                out.combined()
            )));
        }
    }
    Ok(())
}

/// Launch an agent for a plan job. On any failure the partial work is
/// reversed: session killed, worktree removed, record dropped.
#[allow(clippy::too_many_arguments)]
pub async fn launch_job<M: MultiplexerAdapter, C: Clock>(
    mux: &M,
    repo: &Git,
    jobs: &JobStore,
    data: &DataDir,
    config: &Config,
    clock: &C,
    plan_id: &str,
    request: SpawnRequest,
) -> Result<LaunchedJob, SpawnError> {
    let safe_name = sanitize_name(&request.job_name);
    let branch = request
        .branch
        .clone()
        .unwrap_or_else(|| format!("{}/{}", config.branch_prefix, safe_name));
    let worktree_base = config
        .worktree_base_path
        .clone()
        .unwrap_or_else(|| data.worktrees_dir());
    let worktree = worktree_base.join(&safe_name);

    repo.worktree_add(&worktree, &branch, &request.start_point)
        .await?;

    let cleanup_worktree = |git: Git, path: PathBuf, branch: String| async move {
        let _ = git.worktree_remove(&path).await;
        git.delete_branch(&branch).await;
    };

    if let Err(e) = apply_worktree_setup(repo.dir(), &worktree, config).await {
        cleanup_worktree(repo.clone(), worktree.clone(), branch.clone()).await;
        return Err(e);
    }

    let report_path = data.report_path(&request.job_id);
    let prompt_path = worktree.join(".mc/prompt.md");
    let launcher_path = worktree.join(".mc/launch.sh");
    let setup = (|| -> Result<(), SpawnError> {
        write_file(
            &prompt_path,
            &prompt_file_contents(&request, &report_path, config.auto_commit),
        )?;
        write_file(
            &launcher_path,
            &launcher_contents(config.model(), &prompt_path, request.port),
        )?;
        make_executable(&launcher_path)
    })();
    if let Err(e) = setup {
        cleanup_worktree(repo.clone(), worktree.clone(), branch.clone()).await;
        return Err(e);
    }

    let cmd = format!("bash '{}'", launcher_path.display());
    let session_name = format!("mc-{safe_name}");
    let spawned = match request.placement {
        Placement::Session => mux.spawn_session(&session_name, &worktree, &cmd).await,
        Placement::Window => mux.spawn_window(&safe_name, &worktree, &cmd).await,
    };
    let target = match spawned {
        Ok(target) => target,
        Err(e) => {
            cleanup_worktree(repo.clone(), worktree.clone(), branch.clone()).await;
            return Err(e.into());
        }
    };

    // Exit breadcrumb for polls that race the pane death.
    let hook = format!(
        "echo {} >> '{}'",
        request.job_id,
        data.completed_jobs_log().display()
    );
    if let Err(e) = mux.set_pane_died_hook(&target, &hook).await {
        tracing::warn!(job = %request.job_name, error = %e, "pane-died hook install failed");
    }

    let launched = LaunchedJob {
        id: request.job_id.clone(),
        name: request.job_name.clone(),
        branch: branch.clone(),
        worktree_path: worktree.clone(),
        tmux_target: target.clone(),
        placement: request.placement,
        created_at: clock.now(),
        completed_at: None,
        launch_session_id: request.launch_session_id.clone(),
        port: request.port,
    };

    if let Err(e) = jobs.add(launched.clone(), Some(plan_id.to_string())).await {
        let _ = mux.kill(&target).await;
        cleanup_worktree(repo.clone(), worktree, branch).await;
        return Err(e.into());
    }

    Ok(launched)
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;

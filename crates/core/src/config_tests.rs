// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write as _;

#[test]
fn defaults_match_documented_values() {
    let config = Config::default();
    assert_eq!(config.default_placement, Placement::Session);
    assert_eq!(config.poll_interval_ms, 10_000);
    assert_eq!(config.idle_threshold_ms, 300_000);
    assert_eq!(config.max_parallel, 3);
    assert!(config.auto_commit);
    assert_eq!(config.test_timeout_ms, 600_000);
    assert_eq!(config.merge_strategy, MergeStrategy::Squash);
    assert_eq!(config.port_range_start, 14_100);
    assert_eq!(config.port_range_end, 14_199);
    assert_eq!(config.default_permission_policy, PermissionPolicy::Prompt);
    assert_eq!(config.branch_prefix, "mc");
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("nope.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn partial_file_merges_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "maxParallel = 5").unwrap();
    writeln!(f, "mergeStrategy = \"merge\"").unwrap();
    writeln!(f, "testCommand = \"npm test\"").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.max_parallel, 5);
    assert_eq!(config.merge_strategy, MergeStrategy::Merge);
    assert_eq!(config.test_command.as_deref(), Some("npm test"));
    // Untouched fields keep their defaults.
    assert_eq!(config.poll_interval_ms, 10_000);
}

#[test]
fn poll_interval_is_clamped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "pollIntervalMs = 500\n").unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.poll_interval_ms, MIN_POLL_INTERVAL_MS);
}

#[test]
fn worktree_setup_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[worktreeSetup]
copyFiles = [".env"]
symlinkDirs = ["node_modules"]
commands = ["npm run prepare"]
"#,
    )
    .unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.worktree_setup.copy_files, [".env"]);
    assert_eq!(config.worktree_setup.symlink_dirs, ["node_modules"]);
    assert_eq!(config.worktree_setup.commands, ["npm run prepare"]);
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "maxParallel = \"three\"\n").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn ff_only_strategy_parses_kebab_case() {
    let strategy: MergeStrategy = serde_json::from_str("\"ff-only\"").unwrap();
    assert_eq!(strategy, MergeStrategy::FfOnly);
}

#[test]
fn model_falls_back_to_default() {
    let mut config = Config::default();
    assert_eq!(config.model(), DEFAULT_MODEL);
    config.model = Some("claude-opus-4-5".into());
    assert_eq!(config.model(), "claude-opus-4-5");
}

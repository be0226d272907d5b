// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn layout_hangs_off_root() {
    let dir = DataDir::at("/tmp/mc-test");
    assert_eq!(dir.plan_path(), PathBuf::from("/tmp/mc-test/plan.json"));
    assert_eq!(dir.jobs_path(), PathBuf::from("/tmp/mc-test/jobs.json"));
    assert_eq!(
        dir.port_lock_path(),
        PathBuf::from("/tmp/mc-test/port.lock")
    );
    assert_eq!(
        dir.report_path("job-1"),
        PathBuf::from("/tmp/mc-test/reports/job-1.json")
    );
    assert_eq!(
        dir.completed_jobs_log(),
        PathBuf::from("/tmp/mc-test/completed-jobs.log")
    );
}

#[test]
fn ensure_creates_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = DataDir::at(tmp.path().join("state"));
    dir.ensure().unwrap();
    assert!(dir.reports_dir().is_dir());
    assert!(dir.worktrees_dir().is_dir());
}

#[test]
#[serial_test::serial]
fn env_override_wins() {
    std::env::set_var(STATE_DIR_ENV, "/tmp/mc-env-test");
    let dir = DataDir::resolve();
    assert_eq!(dir.root(), Path::new("/tmp/mc-env-test"));
    std::env::remove_var(STATE_DIR_ENV);
}

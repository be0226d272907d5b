// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn write_then_read_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    write_atomic(&path, b"{\"v\":1}").await.unwrap();
    let bytes = read_if_exists(&path).await.unwrap().unwrap();
    assert_eq!(bytes, b"{\"v\":1}");
}

#[tokio::test]
async fn write_leaves_no_tmp_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    write_atomic(&path, b"data").await.unwrap();
    assert!(!dir.path().join("state.json.tmp").exists());
}

#[tokio::test]
async fn stale_tmp_is_cleaned_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"good").unwrap();
    std::fs::write(dir.path().join("state.json.tmp"), b"partial").unwrap();

    let bytes = read_if_exists(&path).await.unwrap().unwrap();
    assert_eq!(bytes, b"good");
    assert!(!dir.path().join("state.json.tmp").exists());
}

#[tokio::test]
async fn missing_file_reads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_if_exists(&dir.path().join("nope.json")).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn remove_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"x").unwrap();
    remove_if_exists(&path).await.unwrap();
    remove_if_exists(&path).await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn overwrite_replaces_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    write_atomic(&path, b"one").await.unwrap();
    write_atomic(&path, b"two").await.unwrap();
    let bytes = read_if_exists(&path).await.unwrap().unwrap();
    assert_eq!(bytes, b"two");
}

#[tokio::test]
async fn locks_are_shared_per_path() {
    let locks = FileLocks::new();
    let a = locks.for_path(Path::new("/tmp/a.json"));
    let b = locks.for_path(Path::new("/tmp/a.json"));
    let other = locks.for_path(Path::new("/tmp/b.json"));
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &other));
}

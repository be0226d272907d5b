// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn missing_binary_yields_remediation_hint() {
    let cli = VcsCli::new("definitely-not-a-real-vcs-cli");
    assert!(!cli.available().await);

    let dir = tempfile::tempdir().unwrap();
    let err = cli
        .pr_create(dir.path(), "mc/integration", "main", "title", "body")
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("not found"), "{text}");
    assert!(text.contains("auth login"), "{text}");
}

#[tokio::test]
async fn fake_cli_returns_stdout_url() {
    // A stand-in binary that echoes a URL, exercising the success path.
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("fake-gh");
    std::fs::write(
        &bin,
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo fake 1.0; exit 0; fi\necho https://example.test/pr/7\n",
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let cli = VcsCli::new(bin.to_string_lossy().to_string());
    let url = cli
        .pr_create(dir.path(), "mc/integration", "main", "t", "b")
        .await
        .unwrap();
    assert_eq!(url, "https://example.test/pr/7");
}

#[tokio::test]
async fn failing_cli_surfaces_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("fake-gh");
    std::fs::write(
        &bin,
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo fake 1.0; exit 0; fi\necho 'no auth' >&2; exit 1\n",
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let cli = VcsCli::new(bin.to_string_lossy().to_string());
    let err = cli
        .pr_create(dir.path(), "h", "b", "t", "b")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no auth"));
}

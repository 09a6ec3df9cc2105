// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn runs_command_to_completion() {
    let mut cmd = Command::new("echo");
    cmd.arg("hello");
    let output = run_with_timeout(cmd, Duration::from_secs(5), "echo")
        .await
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn reports_timeout() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleep probe")
        .await
        .unwrap_err();
    assert!(err.contains("timed out"));
}

#[tokio::test]
async fn reports_missing_binary() {
    let cmd = Command::new("definitely-not-a-real-binary-xyz");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "missing binary")
        .await
        .unwrap_err();
    assert!(err.contains("failed"));
}

#[tokio::test]
async fn run_capture_trims_stdout() {
    let mut cmd = Command::new("echo");
    cmd.arg("  spaced  ");
    let out = run_capture(cmd, Duration::from_secs(5), "echo").await;
    assert_eq!(out.as_deref(), Some("spaced"));
}

#[tokio::test]
async fn run_capture_none_on_failure() {
    let mut cmd = Command::new("false");
    cmd.arg("");
    let out = run_capture(cmd, Duration::from_secs(5), "false").await;
    assert!(out.is_none());
}

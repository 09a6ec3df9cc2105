// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Branch merge detection for the auto-close sweep.
//!
//! A branch only counts as merged when it actually diverged. A freshly
//! created branch (tip equals the merge-base with the default branch and
//! sits on the default branch's first-parent mainline) is reported not
//! merged; a tip that joined the default branch through a merge commit's
//! side parent is. Squash merges are caught by the remote-deleted +
//! patch-identity path.

use crate::git;
use std::path::Path;
use tokio::process::Command;
use ty_adapters::subprocess::{run_capture, GIT_TIMEOUT, NETWORK_TIMEOUT};

/// How far back the mainline containment probe looks.
const MAINLINE_PROBE_DEPTH: &str = "2000";

/// Whether `branch` has been merged into the project's default branch.
///
/// Order of probes: the platform PR state (if the task carries a PR
/// number), then local ancestry, then the remote-deleted + patch-identity
/// path. Probe failures degrade to "not merged"; they never fail the
/// caller.
pub async fn is_branch_merged(
    project_path: &Path,
    branch: &str,
    pr_number: Option<u32>,
) -> bool {
    if let Some(number) = pr_number {
        if pr_is_merged(project_path, number).await == Some(true) {
            return true;
        }
    }

    let default = git::default_branch(project_path).await;

    let Some(tip) = git::rev_parse(project_path, branch).await else {
        return false;
    };
    let Some(default_head) = git::rev_parse(project_path, &default).await else {
        return false;
    };

    // Tip still where the branch was created: never diverged.
    if tip == default_head {
        return false;
    }

    if git::is_ancestor(project_path, &tip, &default).await {
        // An ancestor tip on the first-parent mainline is just a stale
        // pointer into default history, not a merged branch.
        if !on_mainline(project_path, &default, &tip).await {
            return true;
        }
        return false;
    }

    // Squash-merge path: remote branch deleted and every commit is
    // patch-equivalent to one already in the default branch.
    if remote_branch_deleted(project_path, branch).await
        && commits_absorbed(project_path, branch, &default).await
    {
        return true;
    }

    false
}

/// Consult the platform PR state via the `gh` CLI.
///
/// Returns `None` when the CLI is missing, times out, or the query fails.
async fn pr_is_merged(project_path: &Path, number: u32) -> Option<bool> {
    let mut cmd = Command::new("gh");
    cmd.current_dir(project_path)
        .args(["pr", "view", &number.to_string(), "--json", "state"]);
    let stdout = run_capture(cmd, NETWORK_TIMEOUT, "gh pr view").await?;
    let value: serde_json::Value = serde_json::from_str(&stdout).ok()?;
    Some(value.get("state")?.as_str()? == "MERGED")
}

/// Whether `commit` lies on the first-parent history of `default`.
async fn on_mainline(project_path: &Path, default: &str, commit: &str) -> bool {
    let Some(stdout) = git::git_capture(
        project_path,
        &[
            "rev-list",
            "--first-parent",
            "-n",
            MAINLINE_PROBE_DEPTH,
            default,
        ],
        GIT_TIMEOUT,
    )
    .await
    else {
        return false;
    };
    stdout.lines().any(|line| line.trim() == commit)
}

/// Whether the branch no longer exists on the remote.
///
/// A failing or timed-out remote listing reports "still present" so we
/// never auto-close on flaky networking.
async fn remote_branch_deleted(project_path: &Path, branch: &str) -> bool {
    let ref_pattern = format!("refs/heads/{}", branch);
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(project_path)
        .args(["ls-remote", "--heads", "origin", &ref_pattern]);
    match run_capture(cmd, NETWORK_TIMEOUT, "git ls-remote").await {
        Some(stdout) => stdout.is_empty(),
        None => false,
    }
}

/// Whether every commit unique to `branch` is patch-equivalent to a
/// commit already on `default` (`git cherry` prints `-` for those).
async fn commits_absorbed(project_path: &Path, branch: &str, default: &str) -> bool {
    let Some(stdout) =
        git::git_capture(project_path, &["cherry", default, branch], GIT_TIMEOUT).await
    else {
        return false;
    };
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    !lines.is_empty() && lines.iter().all(|l| l.starts_with('-'))
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;

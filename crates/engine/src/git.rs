// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small git query helpers shared by the worktree manager and merge
//! detection. Every invocation carries an explicit timeout.

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use ty_adapters::subprocess::{run_capture, run_with_timeout, GIT_TIMEOUT};

/// Run `git -C <repo> <args>` and return trimmed stdout on success.
pub async fn git_capture(repo: &Path, args: &[&str], timeout: Duration) -> Option<String> {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo).args(args);
    run_capture(cmd, timeout, "git").await
}

/// Run `git -C <repo> <args>`, returning `(success, stderr)`.
pub async fn git_run(repo: &Path, args: &[&str], timeout: Duration) -> (bool, String) {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo).args(args);
    match run_with_timeout(cmd, timeout, "git").await {
        Ok(output) => (
            output.status.success(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        ),
        Err(e) => (false, e),
    }
}

/// Whether `path` is inside a git working tree.
pub async fn is_work_tree(path: &Path) -> bool {
    git_capture(path, &["rev-parse", "--is-inside-work-tree"], GIT_TIMEOUT)
        .await
        .is_some_and(|out| out == "true")
}

/// Resolve the default branch: the remote HEAD symbolic ref, falling back
/// to a local `main`/`master`, falling back to the literal "main".
pub async fn default_branch(repo: &Path) -> String {
    if let Some(head) = git_capture(
        repo,
        &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"],
        GIT_TIMEOUT,
    )
    .await
    {
        if let Some(branch) = head.strip_prefix("origin/") {
            return branch.to_string();
        }
        return head;
    }

    for candidate in ["main", "master"] {
        let ref_name = format!("refs/heads/{}", candidate);
        if git_run(repo, &["show-ref", "--verify", "--quiet", &ref_name], GIT_TIMEOUT)
            .await
            .0
        {
            return candidate.to_string();
        }
    }

    "main".to_string()
}

/// Resolve a revision to a commit hash.
pub async fn rev_parse(repo: &Path, rev: &str) -> Option<String> {
    git_capture(repo, &["rev-parse", "--verify", "--quiet", rev], GIT_TIMEOUT).await
}

/// Merge base of two revisions.
pub async fn merge_base(repo: &Path, a: &str, b: &str) -> Option<String> {
    git_capture(repo, &["merge-base", a, b], GIT_TIMEOUT).await
}

/// Whether `ancestor` is an ancestor of `descendant`.
pub async fn is_ancestor(repo: &Path, ancestor: &str, descendant: &str) -> bool {
    git_run(
        repo,
        &["merge-base", "--is-ancestor", ancestor, descendant],
        GIT_TIMEOUT,
    )
    .await
    .0
}

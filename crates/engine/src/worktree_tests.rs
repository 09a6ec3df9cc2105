// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{fixture, git_repo, run_git};
use ty_core::Project;

async fn setup_project(fx: &crate::test_helpers::Fixture) -> tempfile::TempDir {
    let repo = git_repo();
    fx.deps
        .store
        .upsert_project(Project::new("proj", repo.path()))
        .unwrap();
    repo
}

#[tokio::test]
async fn creates_worktree_branch_and_port() {
    let fx = fixture();
    let repo = setup_project(&fx).await;
    let task = fx.task_in_project("Add contact email", "proj");

    let dir = fx.deps.worktrees.setup_worktree(&task).await.unwrap();

    assert_eq!(
        dir,
        repo.path()
            .join(".task-worktrees")
            .join(format!("{}-add-contact-email", task.id))
    );
    assert!(dir.is_dir());

    let updated = fx.deps.store.get_task(task.id).unwrap();
    assert_eq!(
        updated.branch.as_deref(),
        Some(format!("task/{}-add-contact-email", task.id).as_str())
    );
    assert!(updated.port >= 3100 && updated.port <= 4099);
    assert_eq!(updated.worktree_path.as_deref(), Some(dir.as_path()));
}

#[tokio::test]
async fn rename_preserves_existing_worktree() {
    let fx = fixture();
    let _repo = setup_project(&fx).await;
    let task = fx.task_in_project("old name", "proj");

    let first = fx.deps.worktrees.setup_worktree(&task).await.unwrap();

    // Title change must not move the worktree or create a new branch.
    let mut renamed = fx.deps.store.get_task(task.id).unwrap();
    renamed.title = "completely new name".to_string();
    let renamed = fx.deps.store.update_task(renamed).unwrap();

    let second = fx.deps.worktrees.setup_worktree(&renamed).await.unwrap();
    assert_eq!(first, second);

    let after = fx.deps.store.get_task(task.id).unwrap();
    assert_eq!(
        after.branch.as_deref(),
        Some(format!("task/{}-old-name", task.id).as_str())
    );
}

#[tokio::test]
async fn gitignore_gains_worktrees_entry_once() {
    let fx = fixture();
    let repo = setup_project(&fx).await;

    for title in ["first task", "second task"] {
        let task = fx.task_in_project(title, "proj");
        fx.deps.worktrees.setup_worktree(&task).await.unwrap();
    }

    let gitignore = std::fs::read_to_string(repo.path().join(".gitignore")).unwrap();
    let count = gitignore
        .lines()
        .filter(|l| l.trim() == ".task-worktrees/")
        .count();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn rejects_directory_outside_isolation_subtree() {
    let outside = tempfile::tempdir().unwrap();
    assert!(ensure_isolated(outside.path()).is_err());

    let inside = outside.path().join(".task-worktrees").join("1-x");
    std::fs::create_dir_all(&inside).unwrap();
    assert!(ensure_isolated(&inside).is_ok());

    assert!(ensure_isolated(Path::new("relative/.task-worktrees/1-x")).is_err());
}

#[tokio::test]
async fn missing_project_blocks_setup() {
    let fx = fixture();
    let task = fx.task_in_project("no such project", "ghost");
    let err = fx.deps.worktrees.setup_worktree(&task).await.unwrap_err();
    assert!(matches!(err, WorktreeError::ProjectNotFound(_)));
}

#[tokio::test]
async fn task_without_project_is_refused() {
    let fx = fixture();
    let task = fx.task("orphan task");
    let err = fx.deps.worktrees.setup_worktree(&task).await.unwrap_err();
    assert!(matches!(err, WorktreeError::NoProject(_)));
}

#[tokio::test]
async fn uninitialized_project_dir_gets_a_repo() {
    let fx = fixture();
    let dir = tempfile::tempdir().unwrap();
    fx.deps
        .store
        .upsert_project(Project::new("fresh", dir.path()))
        .unwrap();
    let task = fx.task_in_project("bootstrap", "fresh");

    let worktree = fx.deps.worktrees.setup_worktree(&task).await.unwrap();
    assert!(worktree.is_dir());
    assert!(dir.path().join(".git").exists());
}

#[tokio::test]
async fn branch_race_attaches_existing_branch() {
    let fx = fixture();
    let repo = setup_project(&fx).await;
    let task = fx.task_in_project("raced task", "proj");

    // Branch created by a concurrent host.
    run_git(repo.path(), &["branch", &format!("task/{}-raced-task", task.id)]);

    let dir = fx.deps.worktrees.setup_worktree(&task).await.unwrap();
    assert!(dir.is_dir());
}

#[tokio::test]
async fn init_script_output_lands_in_task_log() {
    let fx = fixture();
    let repo = setup_project(&fx).await;

    std::fs::write(
        repo.path().join(".taskyou.yml"),
        "worktree:\n  init_script: setup.sh\n",
    )
    .unwrap();
    std::fs::write(
        repo.path().join("setup.sh"),
        "#!/bin/sh\necho \"port is $WORKTREE_PORT\"\n",
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            repo.path().join("setup.sh"),
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();
    }

    let task = fx.task_in_project("scripted", "proj");
    fx.deps.worktrees.setup_worktree(&task).await.unwrap();

    let logs = fx.deps.store.logs(task.id);
    let port = fx.deps.store.get_task(task.id).unwrap().port;
    assert!(logs
        .iter()
        .any(|l| l.content == format!("port is {}", port)));
}

#[tokio::test]
async fn failing_init_script_is_only_a_warning() {
    let fx = fixture();
    let repo = setup_project(&fx).await;

    std::fs::write(
        repo.path().join(".taskyou.yml"),
        "worktree:\n  init_script: broken.sh\n",
    )
    .unwrap();
    std::fs::write(repo.path().join("broken.sh"), "#!/bin/sh\nexit 3\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            repo.path().join("broken.sh"),
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();
    }

    let task = fx.task_in_project("warned", "proj");
    let result = fx.deps.worktrees.setup_worktree(&task).await;
    assert!(result.is_ok());

    let logs = fx.deps.store.logs(task.id);
    assert!(logs.iter().any(|l| l.content.contains("exited with 3")));
}

#[tokio::test]
async fn cleanup_removes_worktree_and_branch() {
    let fx = fixture();
    let repo = setup_project(&fx).await;
    let task = fx.task_in_project("short lived", "proj");

    let dir = fx.deps.worktrees.setup_worktree(&task).await.unwrap();
    let task = fx.deps.store.get_task(task.id).unwrap();

    fx.deps.worktrees.cleanup_worktree(&task).await.unwrap();
    assert!(!dir.exists());

    // Cleaning up again tolerates the missing worktree.
    fx.deps.worktrees.cleanup_worktree(&task).await.unwrap();

    let branches = std::process::Command::new("git")
        .arg("-C")
        .arg(repo.path())
        .args(["branch", "--list", task.branch.as_deref().unwrap()])
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&branches.stdout).trim().is_empty());
}

#[test]
fn config_parses_and_tolerates_garbage() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".taskyou.yml"),
        "worktree:\n  init_script: bin/setup\n  teardown_script: bin/teardown\n",
    )
    .unwrap();
    let config = ProjectConfig::load(dir.path());
    assert_eq!(config.worktree.init_script.as_deref(), Some("bin/setup"));
    assert_eq!(
        config.worktree.teardown_script.as_deref(),
        Some("bin/teardown")
    );

    std::fs::write(dir.path().join(".taskyou.yml"), ": not yaml ::").unwrap();
    let config = ProjectConfig::load(dir.path());
    assert!(config.worktree.init_script.is_none());

    let empty = tempfile::tempdir().unwrap();
    assert!(ProjectConfig::load(empty.path()).worktree.init_script.is_none());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;
use ty_core::TaskStatus;

#[tokio::test]
async fn queued_task_runs_in_isolated_worktree_and_completes() {
    let world = world();
    let repo = world.project();
    let task_id = world.create_task("Add contact email");

    world.start_task(task_id).await;

    // Worktree, branch, and port were provisioned before launch.
    let running = world.deps.store.get_task(task_id).unwrap();
    assert_eq!(running.status, TaskStatus::Processing);
    let worktree = running.worktree_path.clone().unwrap();
    assert_eq!(
        worktree,
        repo.path()
            .join(".task-worktrees")
            .join(format!("{}-add-contact-email", task_id))
    );
    assert_eq!(
        running.branch.as_deref(),
        Some(format!("task/{}-add-contact-email", task_id).as_str())
    );
    assert!(running.port >= 3100 && running.port <= 4099);

    // The window runs the adapter's command inside the worktree.
    let windows = world.mux.windows_named(&running.window_name());
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].cwd, worktree);

    // Agent finishes; the status-change tool marks the task done.
    world
        .deps
        .broker
        .update_status(task_id, TaskStatus::Done)
        .unwrap();
    world.wait_for_idle(task_id).await;

    let done = world.deps.store.get_task(task_id).unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    assert!(done.completed_at.is_some());

    // Completion does not kill the agent window.
    assert_eq!(world.mux.windows_named(&done.window_name()).len(), 1);
}

#[tokio::test]
async fn no_two_pickups_for_one_task() {
    let world = world();
    let _repo = world.project();
    let task_id = world.create_task("single runner");

    world
        .deps
        .store
        .update_status(task_id, TaskStatus::Queued)
        .unwrap();

    // Several ticks in a row must not double-launch the task.
    world.supervisor.tick(1).await;
    world.supervisor.tick(2).await;
    world.supervisor.tick(3).await;
    world.wait_for_window(task_id).await;

    assert_eq!(world.supervisor.running_tasks(), vec![task_id]);
    let windows = world
        .mux
        .windows_named(&format!("task-{}", task_id));
    assert_eq!(windows.len(), 1);

    world
        .deps
        .broker
        .update_status(task_id, TaskStatus::Done)
        .unwrap();
    world.wait_for_idle(task_id).await;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;
use ty_core::TaskStatus;

#[tokio::test]
async fn title_rename_keeps_worktree_and_branch() {
    let world = world();
    let _repo = world.project();
    let task_id = world.create_task("old name");

    world.start_task(task_id).await;
    let first = world.deps.store.get_task(task_id).unwrap();
    let first_worktree = first.worktree_path.clone().unwrap();
    let first_branch = first.branch.clone().unwrap();

    // Interrupt, rename, run again.
    world.supervisor.interrupt(task_id).unwrap();
    world.wait_for_idle(task_id).await;

    let mut renamed = world.deps.store.get_task(task_id).unwrap();
    renamed.title = "new name".to_string();
    world.deps.store.update_task(renamed).unwrap();

    world
        .deps
        .store
        .update_status(task_id, TaskStatus::Queued)
        .unwrap();
    for tick in 2..40 {
        world.supervisor.tick(tick).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        if world.deps.store.get_task(task_id).unwrap().status == TaskStatus::Processing {
            break;
        }
    }
    world.wait_for_status(task_id, TaskStatus::Processing).await;
    world.wait_for_window(task_id).await;

    let second = world.deps.store.get_task(task_id).unwrap();
    assert_eq!(second.worktree_path.as_deref(), Some(first_worktree.as_path()));
    assert_eq!(second.branch.as_deref(), Some(first_branch.as_str()));

    world
        .deps
        .broker
        .update_status(task_id, TaskStatus::Done)
        .unwrap();
    world.wait_for_idle(task_id).await;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;
use std::time::Instant;
use ty_core::TaskStatus;

#[tokio::test]
async fn store_level_interrupt_reaches_the_runner_within_a_poll() {
    let world = world();
    let _repo = world.project();
    let task_id = world.create_task("cross host interrupt");

    world.start_task(task_id).await;

    // Another host flips the status in the shared store; this host's
    // poll loop must notice within about one interval.
    let flipped_at = Instant::now();
    world
        .deps
        .store
        .update_status(task_id, TaskStatus::Backlog)
        .unwrap();

    world.wait_for_idle(task_id).await;
    assert!(flipped_at.elapsed() < std::time::Duration::from_secs(3));

    let after = world.deps.store.get_task(task_id).unwrap();
    assert_eq!(after.status, TaskStatus::Backlog);

    // The window survives for inspection.
    assert_eq!(world.mux.windows_named(&after.window_name()).len(), 1);
}

#[tokio::test]
async fn supervisor_interrupt_cancels_local_context() {
    let world = world();
    let _repo = world.project();
    let task_id = world.create_task("local interrupt");

    world.start_task(task_id).await;
    world.supervisor.interrupt(task_id).unwrap();
    world.wait_for_idle(task_id).await;

    let after = world.deps.store.get_task(task_id).unwrap();
    assert_eq!(after.status, TaskStatus::Backlog);
    let logs = world.deps.store.logs(task_id);
    assert!(logs.iter().any(|l| l.content.contains("Task interrupted")));
}

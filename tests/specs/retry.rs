// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;
use ty_core::{LogLineType, TaskStatus};

#[tokio::test]
async fn retry_resumes_previous_session_with_feedback() {
    let world = world();
    let _repo = world.project();
    let task_id = world.create_task("needs another pass");

    // First run: a notification-style callback blocks the task. The
    // runner keeps polling (window alive, agent idle) until retry
    // cancels it.
    world.start_task(task_id).await;
    world
        .deps
        .broker
        .update_status(task_id, TaskStatus::Blocked)
        .unwrap();

    // The adapter discovered a session during the first run.
    world.agent.set_discovered_session(Some("sess-1"));
    world
        .deps
        .store
        .update_session_id(task_id, "sess-1")
        .unwrap();

    world
        .supervisor
        .retry(task_id, Some("use TLS 1.3 only".to_string()))
        .unwrap();

    // Feedback is durably recorded as a relay line.
    let logs = world.deps.store.logs(task_id);
    assert!(logs
        .iter()
        .any(|l| l.line_type == LogLineType::Relay && l.content == "use TLS 1.3 only"));

    // Tick until the old runner drained and the resume picked up.
    for tick in 2..40 {
        world.supervisor.tick(tick).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        if world.deps.store.get_task(task_id).unwrap().status == TaskStatus::Processing
            && world.agent.requests().len() >= 2
        {
            break;
        }
    }

    world.wait_for_status(task_id, TaskStatus::Processing).await;
    let requests = world.agent.requests();
    assert!(requests.len() >= 2, "no resume request was built");
    let last = requests.last().unwrap();
    assert_eq!(last.session_id.as_deref(), Some("sess-1"));

    world
        .deps
        .broker
        .update_status(task_id, TaskStatus::Done)
        .unwrap();
    world.wait_for_idle(task_id).await;
}

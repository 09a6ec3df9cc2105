// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use ty_core::{LogLineType, TaskStatus};

fn created(id: TaskId) -> StoreEvent {
    StoreEvent::TaskCreated {
        task: Task::new(id, format!("task {}", id), Utc::now()),
    }
}

use ty_core::Task;

#[test]
fn task_created_bumps_next_id() {
    let mut state = StoreState::default();
    state.apply(&created(5));
    assert_eq!(state.take_task_id(), 6);
}

#[test]
fn task_updated_replaces_row() {
    let mut state = StoreState::default();
    state.apply(&created(1));

    let mut task = state.tasks[&1].clone();
    task.status = TaskStatus::Queued;
    state.apply(&StoreEvent::TaskUpdated { task });

    assert_eq!(state.tasks[&1].status, TaskStatus::Queued);
}

#[test]
fn task_deleted_cascades() {
    let mut state = StoreState::default();
    state.apply(&created(1));
    state.apply(&StoreEvent::LogAppended {
        entry: ty_core::LogEntry {
            id: 1,
            task_id: 1,
            line_type: LogLineType::System,
            content: "hello".to_string(),
            created_at: Utc::now(),
        },
    });
    state.apply(&StoreEvent::TaskIndexed {
        id: 1,
        text: "hello world".to_string(),
    });

    state.apply(&StoreEvent::TaskDeleted { id: 1 });

    assert!(state.tasks.is_empty());
    assert!(state.logs.is_empty());
    assert!(!state.search.contains(1));
}

#[test]
fn replay_is_deterministic() {
    let events = vec![
        created(1),
        created(2),
        StoreEvent::TaskDeleted { id: 1 },
    ];

    let mut a = StoreState::default();
    let mut b = StoreState::default();
    for event in &events {
        a.apply(event);
        b.apply(event);
    }

    assert_eq!(a.tasks.keys().collect::<Vec<_>>(), b.tasks.keys().collect::<Vec<_>>());
    assert_eq!(a.take_task_id(), 3);
}

#[test]
fn id_counters_start_at_one() {
    let mut state = StoreState::default();
    assert_eq!(state.take_task_id(), 1);
    assert_eq!(state.take_log_id(), 1);
    assert_eq!(state.take_memory_id(), 1);
    assert_eq!(state.take_compaction_id(), 1);
}

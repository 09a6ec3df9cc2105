// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::scheduler::Deps;
use crate::test_helpers::{fixture, Fixture};
use chrono::Utc;
use yare::parameterized;

#[parameterized(
    interrupted_wins = {
        ExecResult::interrupted(), TaskStatus::Done, FinalAction::InterruptedKillAgent
    },
    blocked_hook_honored = {
        ExecResult::success(), TaskStatus::Blocked, FinalAction::HonorBlocked
    },
    done_hook_honored = {
        ExecResult::needs_input("x"), TaskStatus::Done, FinalAction::HonorDone
    },
    clean_success = {
        ExecResult::success(), TaskStatus::Processing, FinalAction::CompleteDone
    },
    needs_input_blocks = {
        ExecResult::needs_input("Task needs review"), TaskStatus::Processing,
        FinalAction::NeedsInput("Task needs review".to_string())
    },
    error_blocks = {
        ExecResult::error("boom"), TaskStatus::Processing,
        FinalAction::BlockedWithError("boom".to_string())
    },
)]
fn final_status_hook_precedence(exec: ExecResult, stored: TaskStatus, expected: FinalAction) {
    assert_eq!(resolve_final(&exec, stored), expected);
}

fn entry(id: i64, line_type: LogLineType, content: &str) -> LogEntry {
    LogEntry {
        id,
        task_id: 1,
        line_type,
        content: content.to_string(),
        created_at: Utc::now(),
    }
}

#[test]
fn latest_feedback_requires_marker() {
    let log = vec![entry(1, LogLineType::Relay, "stale feedback")];
    assert!(latest_feedback(&log).is_none());

    let log = vec![
        entry(1, LogLineType::Relay, "old"),
        entry(2, LogLineType::System, CONTINUATION_MARKER),
        entry(3, LogLineType::Relay, "use TLS 1.3 only"),
    ];
    assert_eq!(latest_feedback(&log).as_deref(), Some("use TLS 1.3 only"));
}

#[test]
fn latest_feedback_ignores_relays_before_last_marker() {
    let log = vec![
        entry(1, LogLineType::System, CONTINUATION_MARKER),
        entry(2, LogLineType::Relay, "first round"),
        entry(3, LogLineType::System, CONTINUATION_MARKER),
    ];
    assert!(latest_feedback(&log).is_none());
}

/// A project whose worktree setup will succeed.
fn project_fixture(fx: &Fixture) -> tempfile::TempDir {
    let repo = crate::test_helpers::git_repo();
    fx.deps
        .store
        .upsert_project(ty_core::Project::new("proj", repo.path()))
        .unwrap();
    repo
}

async fn run_to_completion(fx: &Fixture, task_id: ty_core::TaskId) {
    let cancel = tokio_util::sync::CancellationToken::new();
    run_task(std::sync::Arc::clone(&fx.deps), task_id, cancel).await;
}

#[tokio::test]
async fn happy_path_launches_window_and_completes() {
    let fx = fixture();
    let _repo = project_fixture(&fx);
    let task = fx.task_in_project("Add contact email", "proj");
    fx.deps.store.update_status(task.id, TaskStatus::Queued).unwrap();

    // Complete the task from "outside" once the window is up: the poll
    // loop sees done and returns success.
    let deps = std::sync::Arc::clone(&fx.deps);
    let task_id = task.id;
    let finisher = tokio::spawn(async move {
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let windows_up = deps
                .store
                .get_task(task_id)
                .and_then(|t| t.mux_window)
                .is_some();
            if windows_up {
                deps.broker.update_status(task_id, TaskStatus::Done).unwrap();
                return;
            }
        }
        panic!("window never appeared");
    });

    run_to_completion(&fx, task.id).await;
    finisher.await.unwrap();

    let after = fx.deps.store.get_task(task.id).unwrap();
    assert_eq!(after.status, TaskStatus::Done);
    assert!(after.started_at.is_some());
    assert!(after.port >= 3100 && after.port <= 4099);
    assert!(after
        .worktree_path
        .as_ref()
        .unwrap()
        .display()
        .to_string()
        .contains(".task-worktrees"));
    assert_eq!(after.mux_session.as_deref(), Some("taskyou"));

    // The launch command came from the adapter and ran in the worktree.
    let windows = fx.mux.windows_named(&after.window_name());
    assert_eq!(windows.len(), 1);
    assert!(windows[0].command.starts_with("fake-agent"));
    assert_eq!(
        windows[0].cwd,
        after.worktree_path.clone().unwrap()
    );
    // WORKTREE_* environment went to the window.
    let env_keys: Vec<&str> = windows[0].env.iter().map(|(k, _)| k.as_str()).collect();
    for key in [
        "WORKTREE_TASK_ID",
        "WORKTREE_SESSION_ID",
        "WORKTREE_PORT",
        "WORKTREE_PATH",
        "WORKTREE_DANGEROUS_MODE",
    ] {
        assert!(env_keys.contains(&key), "missing {}", key);
    }
}

#[tokio::test]
async fn window_disappearing_blocks_with_review_question() {
    let fx = fixture();
    let _repo = project_fixture(&fx);
    let task = fx.task_in_project("flaky run", "proj");
    fx.deps.store.update_status(task.id, TaskStatus::Queued).unwrap();

    let mux = fx.mux.clone();
    let deps = std::sync::Arc::clone(&fx.deps);
    let task_id = task.id;
    let closer = tokio::spawn(async move {
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            if deps
                .store
                .get_task(task_id)
                .and_then(|t| t.mux_window)
                .is_some()
            {
                mux.close_window(&format!("task-{}", task_id));
                return;
            }
        }
        panic!("window never appeared");
    });

    run_to_completion(&fx, task.id).await;
    closer.await.unwrap();

    let after = fx.deps.store.get_task(task.id).unwrap();
    assert_eq!(after.status, TaskStatus::Blocked);
    let logs = fx.deps.store.logs(task.id);
    assert!(logs
        .iter()
        .any(|l| l.line_type == LogLineType::Question && l.content == "Task needs review"));
}

#[tokio::test]
async fn cancellation_interrupts_without_killing_window() {
    let fx = fixture();
    let _repo = project_fixture(&fx);
    let task = fx.task_in_project("interrupt me", "proj");
    fx.deps.store.update_status(task.id, TaskStatus::Queued).unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    let runner = tokio::spawn(run_task(
        std::sync::Arc::clone(&fx.deps),
        task.id,
        cancel.clone(),
    ));

    // Wait for the window, set the cross-process interrupt state, then
    // cancel the local context.
    for _ in 0..100 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        if fx
            .deps
            .store
            .get_task(task.id)
            .and_then(|t| t.mux_window)
            .is_some()
        {
            break;
        }
    }
    fx.deps
        .broker
        .update_status(task.id, TaskStatus::Backlog)
        .unwrap();
    cancel.cancel();
    runner.await.unwrap();

    let after = fx.deps.store.get_task(task.id).unwrap();
    assert_eq!(after.status, TaskStatus::Backlog);
    // The window is retained for inspection.
    assert_eq!(fx.mux.windows_named(&after.window_name()).len(), 1);
}

#[tokio::test]
async fn unavailable_agent_blocks_without_launching() {
    let fx = fixture();
    let _repo = project_fixture(&fx);
    let task = fx.task_in_project("no cli", "proj");
    fx.deps.store.update_status(task.id, TaskStatus::Queued).unwrap();
    fx.agent.set_available(false);

    run_to_completion(&fx, task.id).await;

    let after = fx.deps.store.get_task(task.id).unwrap();
    assert_eq!(after.status, TaskStatus::Blocked);
    assert!(fx.mux.windows_named(&after.window_name()).is_empty());
    let logs = fx.deps.store.logs(task.id);
    assert!(logs.iter().any(|l| l.content.contains("not installed")));
}

#[tokio::test]
async fn worktree_failure_blocks_without_launching() {
    let fx = fixture();
    let task = fx.task_in_project("ghost project", "nowhere");
    fx.deps.store.update_status(task.id, TaskStatus::Queued).unwrap();

    run_to_completion(&fx, task.id).await;

    let after = fx.deps.store.get_task(task.id).unwrap();
    assert_eq!(after.status, TaskStatus::Blocked);
    assert!(fx.mux.windows_named(&after.window_name()).is_empty());
}

#[tokio::test]
async fn resume_passes_session_and_feedback() {
    let fx = fixture();
    let _repo = project_fixture(&fx);
    let task = fx.task_in_project("retry with feedback", "proj");

    // Prior session exists and the user retried with feedback.
    fx.deps
        .store
        .update_session_id(task.id, "sess-prev")
        .unwrap();
    fx.deps
        .broker
        .log_system(task.id, CONTINUATION_MARKER)
        .unwrap();
    fx.deps
        .broker
        .append_log(task.id, LogLineType::Relay, "use TLS 1.3 only")
        .unwrap();
    fx.deps.store.update_status(task.id, TaskStatus::Queued).unwrap();

    let deps = std::sync::Arc::clone(&fx.deps);
    let task_id = task.id;
    let finisher = tokio::spawn(async move {
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            if deps
                .store
                .get_task(task_id)
                .and_then(|t| t.mux_window)
                .is_some()
            {
                deps.broker.update_status(task_id, TaskStatus::Done).unwrap();
                return;
            }
        }
        panic!("window never appeared");
    });

    run_to_completion(&fx, task.id).await;
    finisher.await.unwrap();

    let requests = fx.agent.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].session_id.as_deref(), Some("sess-prev"));

    // The feedback made it into the prompt file content via the command;
    // the fake records the request, so check the prompt path existed at
    // build time and the command carries the resume flag.
    let windows = fx.mux.windows_named(&format!("task-{}", task.id));
    assert!(windows[0].command.contains("--resume sess-prev"));
}

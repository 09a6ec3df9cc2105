// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task execution path.
//!
//! Provisions the worktree, composes the prompt, launches the agent in a
//! multiplexer window with a side shell pane, then polls the store and
//! window liveness until the run terminates. Completion does not kill the
//! agent; leaving it alive makes retry and resume cheap.

use crate::attachments;
use crate::error::RuntimeError;
use crate::prompt::{self, PromptInput};
use crate::scheduler::Deps;
use crate::{hooks, worktree};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use ty_adapters::agent::{write_prompt_file, Agent, LaunchRequest};
use ty_core::log::CONTINUATION_MARKER;
use ty_core::{ExecResult, LogEntry, LogLineType, Task, TaskId, TaskStatus};

/// Store re-read cadence while waiting for termination.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Grace period for the window's shell to read the prompt file before it
/// is unlinked.
const PROMPT_FILE_GRACE: Duration = Duration::from_millis(500);

/// Execute one task to termination and apply the final status.
pub async fn run_task(deps: Arc<Deps>, task_id: TaskId, cancel: CancellationToken) {
    if let Err(e) = run_task_inner(&deps, task_id, cancel).await {
        tracing::error!(task_id, error = %e, "task runner failed");
        let _ = deps
            .broker
            .append_log(task_id, LogLineType::Error, &format!("Execution failed: {}", e));
        let _ = deps.broker.update_status(task_id, TaskStatus::Blocked);
    }
}

async fn run_task_inner(
    deps: &Arc<Deps>,
    task_id: TaskId,
    cancel: CancellationToken,
) -> Result<(), RuntimeError> {
    let task = deps
        .store
        .get_task(task_id)
        .ok_or(RuntimeError::TaskNotFound(task_id))?;

    deps.broker.update_status(task_id, TaskStatus::Processing)?;
    deps.broker.log_system(task_id, "Task started")?;

    // Worktree first: nothing launches outside the isolation subtree.
    let work_dir = match deps.worktrees.setup_worktree(&task).await {
        Ok(dir) => dir,
        Err(e) => {
            deps.broker.append_log(
                task_id,
                LogLineType::Error,
                &format!("Worktree setup failed: {}", e),
            )?;
            deps.broker.update_status(task_id, TaskStatus::Blocked)?;
            return Ok(());
        }
    };

    let staged = attachments::materialize(&deps.state_dir, task_id).unwrap_or_else(|e| {
        tracing::warn!(task_id, error = %e, "attachment staging failed");
        attachments::Materialized::empty()
    });

    let Some(agent) = deps.agent() else {
        deps.broker
            .log_system(task_id, "No agent adapter configured")?;
        deps.broker.update_status(task_id, TaskStatus::Blocked)?;
        return Ok(());
    };
    if !agent.is_available() {
        deps.broker.log_system(
            task_id,
            &format!("Agent CLI '{}' is not installed", agent.binary()),
        )?;
        deps.broker.update_status(task_id, TaskStatus::Blocked)?;
        return Ok(());
    }

    // Re-read: worktree setup persisted path, branch, and port.
    let task = deps
        .store
        .get_task(task_id)
        .ok_or(RuntimeError::TaskNotFound(task_id))?;

    let resume_session = if agent.supports_session_resume() {
        task.agent_session_id
            .clone()
            .or_else(|| agent.find_session_id(task_id, &work_dir))
    } else {
        None
    };
    let first_run = resume_session.is_none();

    let prompt = build_prompt(deps, &task, &staged.paths, first_run);
    if !first_run {
        ensure_continuation_marker(deps, task_id)?;
    }

    let exec = launch_and_poll(
        deps,
        agent.as_ref(),
        &task,
        &work_dir,
        &prompt,
        resume_session,
        cancel,
    )
    .await;
    drop(staged);

    let stored_status = deps
        .store
        .get_task(task_id)
        .map(|t| t.status)
        .unwrap_or(TaskStatus::Blocked);

    apply_final(deps, agent.as_ref(), task_id, &exec, stored_status).await
}

/// Compose the launch prompt, appending feedback and recurring headers
/// for resumed runs.
fn build_prompt(deps: &Arc<Deps>, task: &Task, staged: &[PathBuf], first_run: bool) -> String {
    let project = task
        .project
        .as_deref()
        .and_then(|p| deps.store.get_project(p));
    let memories = project
        .as_ref()
        .map(|p| deps.store.list_memories(&p.name))
        .unwrap_or_default();
    let similar = deps.store.find_similar(
        &format!("{} {}", task.title, task.body),
        3,
        Some(task.id),
    );
    let log = deps.store.logs(task.id);
    let task_type = task
        .task_type
        .as_deref()
        .and_then(|t| deps.store.get_task_type(t));

    let mut text = prompt::compose(&PromptInput {
        task,
        project: project.as_ref(),
        task_type: task_type.as_ref(),
        memories: &memories,
        similar: &similar,
        log: &log,
        attachments: staged,
        first_run,
    });

    if !first_run {
        if task.recurrence.is_some() && task.last_run_at.is_some() {
            text = format!("{}\n\n{}", prompt::recurring_header(), text);
        }
        if let Some(feedback) = latest_feedback(&log) {
            text = format!("{}\n\n{}", text, prompt::feedback_section(&feedback));
        }
    }
    text
}

/// The most recent relay line after the last continuation marker, if any.
fn latest_feedback(log: &[LogEntry]) -> Option<String> {
    let last_marker = log
        .iter()
        .rposition(|e| e.line_type == LogLineType::System && e.content.contains(CONTINUATION_MARKER))?;
    log[last_marker..]
        .iter()
        .rev()
        .find(|e| e.line_type == LogLineType::Relay)
        .map(|e| e.content.clone())
}

fn ensure_continuation_marker(deps: &Arc<Deps>, task_id: TaskId) -> Result<(), RuntimeError> {
    let log = deps.store.logs(task_id);
    let tail_has_marker = log
        .iter()
        .rev()
        .take(3)
        .any(|e| e.line_type == LogLineType::System && e.content.contains(CONTINUATION_MARKER));
    if !tail_has_marker {
        deps.broker.log_system(task_id, CONTINUATION_MARKER)?;
    }
    Ok(())
}

/// The `WORKTREE_*` environment handed to the agent and the shell pane.
pub(crate) fn worktree_env(deps: &Arc<Deps>, task: &Task, work_dir: &Path) -> Vec<(String, String)> {
    vec![
        ("WORKTREE_TASK_ID".to_string(), task.id.to_string()),
        (
            "WORKTREE_SESSION_ID".to_string(),
            deps.next_session_seq().to_string(),
        ),
        ("WORKTREE_PORT".to_string(), task.port.to_string()),
        (
            "WORKTREE_PATH".to_string(),
            work_dir.display().to_string(),
        ),
        (
            "WORKTREE_DANGEROUS_MODE".to_string(),
            if task.dangerous_mode { "1" } else { "0" }.to_string(),
        ),
    ]
}

/// Launch the agent window (plus shell pane) and poll to termination.
async fn launch_and_poll(
    deps: &Arc<Deps>,
    agent: &dyn Agent,
    task: &Task,
    work_dir: &Path,
    prompt: &str,
    resume_session: Option<String>,
    cancel: CancellationToken,
) -> ExecResult {
    // Hook configuration is agent-local; only Claude consumes it today.
    if agent.name() == "claude" {
        if let Err(e) = hooks::write_hook_settings(work_dir, &deps.host_binary) {
            tracing::warn!(task_id = task.id, error = %e, "hook settings write failed");
        }
        if let Some(project) = task.project.as_deref().and_then(|p| deps.store.get_project(p)) {
            if let Err(e) = hooks::link_project_claude(work_dir, &project.path) {
                tracing::warn!(task_id = task.id, error = %e, "claude config link failed");
            }
        }
    }

    if let Err(e) = worktree::ensure_isolated(work_dir) {
        return ExecResult::error(e.to_string());
    }

    let prompt_file = match write_prompt_file(prompt) {
        Ok(file) => file,
        Err(e) => return ExecResult::error(format!("prompt staging failed: {}", e)),
    };

    let env = worktree_env(deps, task, work_dir);
    let request = LaunchRequest {
        task_id: task.id,
        session_id: resume_session.clone(),
        prompt_path: Some(prompt_file.path().to_path_buf()),
        dangerous: task.dangerous_mode,
        env: env.clone(),
        work_dir: work_dir.to_path_buf(),
    };
    let command = agent.build_command(&request);

    let session = match deps.mux.ensure_daemon_session().await {
        Ok(session) => session,
        Err(e) => return ExecResult::error(format!("multiplexer unavailable: {}", e)),
    };

    let window = task.window_name();
    // Duplicate windows are reconciled by killing all and recreating.
    let _ = deps.mux.kill_windows_by_name(&window).await;

    let window_id = match deps
        .mux
        .create_window(&session, &window, work_dir, &command, &env)
        .await
    {
        Ok(id) => id,
        Err(e) => return ExecResult::error(format!("window create failed: {}", e)),
    };
    let target = format!("{}:{}", session, window_id);

    if let Err(e) = deps
        .mux
        .split_pane_horizontal(&target, work_dir, &env)
        .await
    {
        tracing::debug!(task_id = task.id, error = %e, "shell pane split failed");
    }

    let persist = deps
        .store
        .update_daemon_session(task.id, &session)
        .and_then(|_| deps.store.update_window_id(task.id, &window_id));
    if let Err(e) = persist {
        tracing::warn!(task_id = task.id, error = %e, "window bookkeeping failed");
    }
    if let Some(session_id) = &resume_session {
        let _ = deps.store.update_session_id(task.id, session_id);
    }

    // The window's shell expands "$(cat ...)" at startup; give it a
    // moment before the temp file goes away.
    tokio::time::sleep(PROMPT_FILE_GRACE).await;
    drop(prompt_file);

    poll_termination(deps, agent, task.id, &target, cancel).await
}

/// Poll the store and window liveness every second until the run
/// reaches a terminal condition.
async fn poll_termination(
    deps: &Arc<Deps>,
    agent: &dyn Agent,
    task_id: TaskId,
    target: &str,
    cancel: CancellationToken,
) -> ExecResult {
    loop {
        if cancel.is_cancelled() {
            // Keep the window alive for inspection.
            return ExecResult::interrupted();
        }

        // Hook and control messages land here within a poll interval.
        for msg in deps.mailbox.drain() {
            deps.apply_control(msg);
        }

        let Some(task) = deps.store.get_task(task_id) else {
            return ExecResult::error("task deleted during execution");
        };
        match task.status {
            TaskStatus::Backlog => return ExecResult::interrupted(),
            TaskStatus::Done => return ExecResult::success(),
            _ => {}
        }

        // Persist a discovered session id once the agent has created one.
        if task.agent_session_id.is_none() {
            if let Some(work_dir) = &task.worktree_path {
                if let Some(session) = agent.find_session_id(task_id, work_dir) {
                    let _ = deps.store.update_session_id(task_id, &session);
                }
            }
        }

        let window_alive = deps.mux.window_exists(target).await.unwrap_or(false);
        if !window_alive {
            // One more read: a hook may have landed a terminal state just
            // before the window went away.
            let status = deps
                .store
                .get_task(task_id)
                .map(|t| t.status)
                .unwrap_or(TaskStatus::Blocked);
            return match status {
                TaskStatus::Done => ExecResult::success(),
                TaskStatus::Backlog => ExecResult::interrupted(),
                _ => ExecResult::needs_input("Task needs review"),
            };
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Final status of a finished run, in hook-precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalAction {
    /// Interrupt already moved the task to backlog; reclaim the agent.
    InterruptedKillAgent,
    /// A callback (or the agent) blocked the task; honor it.
    HonorBlocked,
    /// The agent marked the task done itself; honor it and distill.
    HonorDone,
    /// Clean success: transition to done and distill.
    CompleteDone,
    /// Agent stopped wanting input.
    NeedsInput(String),
    /// Launch or execution error.
    BlockedWithError(String),
}

/// Resolve the final action from the exec result and the status the
/// store holds after the run.
pub fn resolve_final(exec: &ExecResult, stored: TaskStatus) -> FinalAction {
    if exec.interrupted {
        return FinalAction::InterruptedKillAgent;
    }
    if stored == TaskStatus::Blocked {
        return FinalAction::HonorBlocked;
    }
    if stored == TaskStatus::Done {
        return FinalAction::HonorDone;
    }
    if exec.success {
        return FinalAction::CompleteDone;
    }
    if exec.needs_input {
        return FinalAction::NeedsInput(
            exec.message
                .clone()
                .unwrap_or_else(|| "Task needs review".to_string()),
        );
    }
    FinalAction::BlockedWithError(
        exec.message
            .clone()
            .unwrap_or_else(|| "Agent execution failed".to_string()),
    )
}

async fn apply_final(
    deps: &Arc<Deps>,
    agent: &dyn Agent,
    task_id: TaskId,
    exec: &ExecResult,
    stored: TaskStatus,
) -> Result<(), RuntimeError> {
    match resolve_final(exec, stored) {
        FinalAction::InterruptedKillAgent => {
            // Interrupt already set the stored status (backlog, or queued
            // for a retry); reclaim memory, keep the window.
            agent.kill(task_id).await;
            if stored == TaskStatus::Backlog {
                deps.broker.log_system(task_id, "Execution interrupted")?;
            }
        }
        FinalAction::HonorBlocked => {
            // A callback owns this state; nothing further to do.
        }
        FinalAction::HonorDone => {
            deps.broker.log_system(task_id, "Task completed")?;
            crate::distill::run_and_stamp(deps, task_id).await;
        }
        FinalAction::CompleteDone => {
            deps.broker.update_status(task_id, TaskStatus::Done)?;
            deps.broker.log_system(task_id, "Task completed")?;
            crate::distill::run_and_stamp(deps, task_id).await;
        }
        FinalAction::NeedsInput(message) => {
            deps.broker.update_status(task_id, TaskStatus::Blocked)?;
            deps.broker
                .append_log(task_id, LogLineType::Question, &message)?;
        }
        FinalAction::BlockedWithError(message) => {
            deps.broker.update_status(task_id, TaskStatus::Blocked)?;
            deps.broker
                .append_log(task_id, LogLineType::Error, &message)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime switch between permissioned and unrestricted agent modes.
//!
//! The switch is a kill-and-relaunch with session resume: the current
//! window goes away (wherever it lives, including a renamed session),
//! and a fresh window starts the same conversation with the dangerous
//! flag toggled.

use crate::error::RuntimeError;
use crate::scheduler::Deps;
use std::sync::Arc;
use ty_adapters::agent::LaunchRequest;
use ty_core::TaskId;

/// Relaunch the task's agent with permission prompts skipped.
pub async fn resume_dangerous(deps: &Arc<Deps>, task_id: TaskId) -> Result<(), RuntimeError> {
    switch(deps, task_id, true).await
}

/// Relaunch the task's agent back in permissioned mode.
pub async fn resume_safe(deps: &Arc<Deps>, task_id: TaskId) -> Result<(), RuntimeError> {
    switch(deps, task_id, false).await
}

async fn switch(deps: &Arc<Deps>, task_id: TaskId, dangerous: bool) -> Result<(), RuntimeError> {
    let task = deps
        .store
        .get_task(task_id)
        .ok_or(RuntimeError::TaskNotFound(task_id))?;

    let agent = deps
        .agent()
        .ok_or_else(|| RuntimeError::Unsupported("no agent configured".to_string()))?;
    if !agent.supports_session_resume() {
        return Err(RuntimeError::Unsupported(format!(
            "{} cannot resume sessions",
            agent.name()
        )));
    }
    if dangerous && !agent.supports_dangerous_mode() {
        return Err(RuntimeError::Unsupported(format!(
            "{} has no dangerous mode",
            agent.name()
        )));
    }

    let work_dir = task
        .worktree_path
        .clone()
        .ok_or_else(|| RuntimeError::Unsupported("task has no worktree".to_string()))?;
    crate::worktree::ensure_isolated(&work_dir)?;

    let session_id = task
        .agent_session_id
        .clone()
        .or_else(|| agent.find_session_id(task_id, &work_dir))
        .ok_or_else(|| RuntimeError::Unsupported("no session to resume".to_string()))?;

    // Kill every window carrying this task's name; the global sweep
    // covers both the stored session and the current daemon session.
    let window = task.window_name();
    let _ = deps.mux.kill_windows_by_name(&window).await;

    let session = deps.mux.ensure_daemon_session().await?;

    let updated = deps.store.update_dangerous_mode(task_id, dangerous)?;

    let env = crate::runner::worktree_env(deps, &updated, &work_dir);
    let request = LaunchRequest {
        task_id,
        session_id: Some(session_id.clone()),
        prompt_path: None,
        dangerous,
        env: env.clone(),
        work_dir: work_dir.clone(),
    };
    let command = agent.build_command(&request);

    let window_id = deps
        .mux
        .create_window(&session, &window, &work_dir, &command, &env)
        .await?;
    let target = format!("{}:{}", session, window_id);
    if let Err(e) = deps.mux.split_pane_horizontal(&target, &work_dir, &env).await {
        tracing::debug!(task_id, error = %e, "shell pane split failed");
    }

    deps.store.update_daemon_session(task_id, &session)?;
    deps.store.update_window_id(task_id, &window_id)?;
    deps.store.update_session_id(task_id, &session_id)?;

    deps.broker.log_system(
        task_id,
        &format!(
            "Agent relaunched in {} mode",
            if dangerous { "unrestricted" } else { "safe" }
        ),
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "modeswitch_tests.rs"]
mod tests;

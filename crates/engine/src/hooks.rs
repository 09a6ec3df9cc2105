// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle callback sink.
//!
//! Agents that support lifecycle hooks are configured (per worktree) to
//! invoke the host binary with `--event <name>` on pre-tool, post-tool,
//! notification, stop, and pre-compact events. The sink maps those onto
//! status transitions and transcript persistence. It is invoked from a
//! different process than the supervisor and coordinates only through the
//! persistent store; the supervisor's polling loop is what makes the
//! protocol reliable when an event is lost.

use crate::broker::LogBroker;
use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ty_core::{HookEvent, TaskId, TaskStatus};
use ty_storage::TaskStore;

/// JSON payload the agent pipes to a hook command on stdin.
///
/// Fields are a superset across events; anything absent deserializes to
/// its default.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HookPayload {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
    /// Compaction trigger ("manual" / "auto").
    #[serde(default)]
    pub trigger: Option<String>,
    /// True when the agent stopped because a stop hook is already active
    /// (not an end-of-turn stop).
    #[serde(default)]
    pub stop_hook_active: bool,
}

/// Apply one lifecycle event to the task. Idempotent per event.
pub fn handle_event(
    store: &Arc<TaskStore>,
    broker: &Arc<LogBroker>,
    event: HookEvent,
    task_id: TaskId,
    payload: &HookPayload,
) -> Result<(), RuntimeError> {
    let task = store
        .get_task(task_id)
        .ok_or(RuntimeError::TaskNotFound(task_id))?;

    match event {
        // Tool activity proves the agent is working again.
        HookEvent::PreToolUse | HookEvent::PostToolUse => {
            if task.status == TaskStatus::Blocked {
                broker.update_status(task_id, TaskStatus::Processing)?;
            }
        }

        // Idle or permission prompt: the agent wants the user.
        HookEvent::Notification => {
            if task.status == TaskStatus::Processing {
                broker.update_status(task_id, TaskStatus::Blocked)?;
                broker.log_system(task_id, "Agent is waiting for input")?;
            }
        }

        // End-of-turn stop while processing means the agent finished its
        // turn without completing the task.
        HookEvent::Stop => {
            if !payload.stop_hook_active && task.status == TaskStatus::Processing {
                broker.update_status(task_id, TaskStatus::Blocked)?;
            }
        }

        // Persist the current transcript for durability before the agent
        // compacts it away.
        HookEvent::PreCompact => {
            let Some(path) = &payload.transcript_path else {
                return Ok(());
            };
            let transcript = std::fs::read_to_string(path)?;
            let session = payload
                .session_id
                .clone()
                .or(task.agent_session_id)
                .unwrap_or_default();
            let trigger = payload.trigger.as_deref().unwrap_or("pre_compact");
            // Coarse size estimate; the agent does not report counts here.
            let pre_tokens = (transcript.len() / 4) as u64;
            store.save_compaction(task_id, &session, trigger, pre_tokens, &transcript)?;
        }
    }

    Ok(())
}

/// Write the per-worktree hook configuration for agents that support it.
///
/// Produces `<worktree>/.claude/settings.local.json` mapping every
/// lifecycle event to `<host-binary> claude-hook --event <EventName>`.
/// Existing local settings are merged over, not clobbered.
pub fn write_hook_settings(worktree: &Path, host_binary: &Path) -> std::io::Result<PathBuf> {
    let claude_dir = worktree.join(".claude");
    std::fs::create_dir_all(&claude_dir)?;
    let settings_path = claude_dir.join("settings.local.json");

    let mut settings: serde_json::Value = std::fs::read_to_string(&settings_path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_else(|| json!({}));
    if !settings.is_object() {
        settings = json!({});
    }

    let mut hooks = serde_json::Map::new();
    for event in HookEvent::ALL {
        let entry = json!([{
            "matcher": "",
            "hooks": [{
                "type": "command",
                "command": format!(
                    "{} claude-hook --event {}",
                    host_binary.display(),
                    event.as_str()
                ),
            }],
        }]);
        hooks.insert(event.as_str().to_string(), entry);
    }

    if let Some(obj) = settings.as_object_mut() {
        obj.insert("hooks".to_string(), serde_json::Value::Object(hooks));
    }

    std::fs::write(&settings_path, serde_json::to_string_pretty(&settings)?)?;
    Ok(settings_path)
}

/// Symlink the project's `.claude/` entries into the worktree so
/// permissions granted once are shared. `settings.local.json` stays
/// worktree-local.
pub fn link_project_claude(worktree: &Path, project_path: &Path) -> std::io::Result<()> {
    let source_dir = project_path.join(".claude");
    if !source_dir.is_dir() {
        return Ok(());
    }
    let target_dir = worktree.join(".claude");
    std::fs::create_dir_all(&target_dir)?;

    for entry in std::fs::read_dir(&source_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == "settings.local.json" {
            continue;
        }
        let target = target_dir.join(&name);
        if target.exists() {
            continue;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(entry.path(), &target)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;

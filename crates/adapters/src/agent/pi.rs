// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pi CLI adapter.

use super::{
    assemble_command, escape_project_dir, newest_file_in, shell_quote, Agent, LaunchRequest,
    ProcessControl,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ty_core::TaskId;

/// Adapter for the Pi CLI.
///
/// Pi is the one adapter with an explicit session file: the core owns
/// `{project}/.task-worktrees/sessions/task-{id}.jsonl` and passes it via
/// `--session`, so conversation state survives worktree teardown.
pub struct PiAgent {
    process: Arc<ProcessControl>,
}

impl PiAgent {
    pub fn new(process: Arc<ProcessControl>) -> Self {
        Self { process }
    }

    /// The explicit session file for a task, derived from the worktree
    /// location (`{project}/.task-worktrees/{id}-{slug}` → sibling
    /// `sessions/` directory).
    pub fn session_file(task_id: TaskId, work_dir: &Path) -> Option<PathBuf> {
        let worktrees = work_dir.parent()?;
        Some(
            worktrees
                .join("sessions")
                .join(format!("task-{}.jsonl", task_id)),
        )
    }

    /// Legacy per-path session directory under the home dir.
    fn legacy_sessions_dir(work_dir: &Path) -> Option<PathBuf> {
        dirs::home_dir().map(|h| {
            h.join(".pi")
                .join("agent")
                .join("sessions")
                .join(escape_project_dir(work_dir))
        })
    }
}

impl Agent for PiAgent {
    fn name(&self) -> &'static str {
        "pi"
    }

    fn supports_session_resume(&self) -> bool {
        true
    }

    fn supports_dangerous_mode(&self) -> bool {
        false
    }

    fn build_command(&self, req: &LaunchRequest) -> String {
        let mut args = Vec::new();
        if let Some(path) = Self::session_file(req.task_id, &req.work_dir) {
            args.push("--session".to_string());
            args.push(shell_quote(&path.display().to_string()));
        }
        if req.session_id.is_some() {
            args.push("--continue".to_string());
        }
        assemble_command(&req.env, &self.binary(), &args, req.prompt_path.as_deref())
    }

    /// The explicit session file path; falls back to the legacy per-path
    /// directory for sessions created by older versions.
    fn find_session_id(&self, task_id: TaskId, work_dir: &Path) -> Option<String> {
        if let Some(path) = Self::session_file(task_id, work_dir) {
            if path.exists() {
                return Some(path.display().to_string());
            }
        }
        let legacy = Self::legacy_sessions_dir(work_dir)?;
        newest_file_in(&legacy).map(|p| p.display().to_string())
    }

    fn process(&self) -> &ProcessControl {
        &self.process
    }
}

#[cfg(test)]
#[path = "pi_tests.rs"]
mod tests;

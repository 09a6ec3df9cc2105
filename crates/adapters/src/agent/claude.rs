// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code adapter.

use super::{
    assemble_command, escape_project_dir, newest_file_in, Agent, LaunchRequest, ProcessControl,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ty_core::TaskId;

/// Adapter for the Claude Code CLI.
pub struct ClaudeAgent {
    process: Arc<ProcessControl>,
}

impl ClaudeAgent {
    pub fn new(process: Arc<ProcessControl>) -> Self {
        Self { process }
    }

    /// Claude's config dir: `$CLAUDE_CONFIG_DIR`, else `~/.claude`.
    fn config_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var("CLAUDE_CONFIG_DIR") {
            return Some(PathBuf::from(dir));
        }
        dirs::home_dir().map(|h| h.join(".claude"))
    }

    /// Per-project session directory (path-escaped project name).
    fn project_sessions_dir(work_dir: &Path) -> Option<PathBuf> {
        Some(
            Self::config_dir()?
                .join("projects")
                .join(escape_project_dir(work_dir)),
        )
    }
}

impl Agent for ClaudeAgent {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn supports_session_resume(&self) -> bool {
        true
    }

    fn supports_dangerous_mode(&self) -> bool {
        true
    }

    fn dangerous_args(&self) -> Vec<String> {
        vec!["--dangerously-skip-permissions".to_string()]
    }

    fn build_command(&self, req: &LaunchRequest) -> String {
        let mut args = Vec::new();
        if req.dangerous {
            args.extend(self.dangerous_args());
        }
        if let Some(session) = &req.session_id {
            args.push("--resume".to_string());
            args.push(session.clone());
        }
        assemble_command(&req.env, &self.binary(), &args, req.prompt_path.as_deref())
    }

    /// Most recent session file in the per-project directory, by mtime.
    fn find_session_id(&self, _task_id: TaskId, work_dir: &Path) -> Option<String> {
        let dir = Self::project_sessions_dir(work_dir)?;
        let newest = newest_file_in(&dir)?;
        if newest.extension().is_some_and(|e| e == "jsonl") {
            newest.file_stem().map(|s| s.to_string_lossy().to_string())
        } else {
            None
        }
    }

    fn process(&self) -> &ProcessControl {
        &self.process
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;

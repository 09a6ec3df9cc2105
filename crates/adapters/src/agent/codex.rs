// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex CLI adapter.

use super::{assemble_command, Agent, LaunchRequest, ProcessControl};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ty_core::TaskId;
use walkdir::WalkDir;

/// Adapter for the Codex CLI.
pub struct CodexAgent {
    process: Arc<ProcessControl>,
}

impl CodexAgent {
    pub fn new(process: Arc<ProcessControl>) -> Self {
        Self { process }
    }

    /// Codex keeps all sessions in one global directory.
    fn sessions_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".codex").join("sessions"))
    }
}

impl Agent for CodexAgent {
    fn name(&self) -> &'static str {
        "codex"
    }

    fn supports_session_resume(&self) -> bool {
        true
    }

    fn supports_dangerous_mode(&self) -> bool {
        true
    }

    fn dangerous_args(&self) -> Vec<String> {
        vec!["--dangerously-bypass-approvals-and-sandbox".to_string()]
    }

    fn build_command(&self, req: &LaunchRequest) -> String {
        let mut args = Vec::new();
        if req.dangerous {
            args.extend(self.dangerous_args());
        }
        if let Some(session) = &req.session_id {
            args.push("resume".to_string());
            args.push(session.clone());
        }
        assemble_command(&req.env, &self.binary(), &args, req.prompt_path.as_deref())
    }

    /// Newest session file whose JSON mentions the working directory.
    fn find_session_id(&self, _task_id: TaskId, work_dir: &Path) -> Option<String> {
        let dir = Self::sessions_dir()?;
        let needle = work_dir.display().to_string();

        let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in WalkDir::new(&dir).into_iter().flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|e| e != "jsonl") {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            if !content.contains(&needle) {
                continue;
            }
            let Some(mtime) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
                continue;
            };
            if best.as_ref().is_none_or(|(t, _)| mtime > *t) {
                best = Some((mtime, path.to_path_buf()));
            }
        }

        best.and_then(|(_, path)| path.file_stem().map(|s| s.to_string_lossy().to_string()))
    }

    fn process(&self) -> &ProcessControl {
        &self.process
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini CLI adapter.

use super::{assemble_command, newest_file_in, Agent, LaunchRequest, ProcessControl};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ty_core::TaskId;

/// Adapter for the Gemini CLI.
pub struct GeminiAgent {
    process: Arc<ProcessControl>,
}

impl GeminiAgent {
    pub fn new(process: Arc<ProcessControl>) -> Self {
        Self { process }
    }

    /// Gemini keys per-project state by a hash of the project path.
    fn chats_dir(work_dir: &Path) -> Option<PathBuf> {
        let mut hasher = Sha256::new();
        hasher.update(work_dir.display().to_string().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        dirs::home_dir().map(|h| h.join(".gemini").join("tmp").join(digest).join("chats"))
    }
}

impl Agent for GeminiAgent {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn supports_session_resume(&self) -> bool {
        true
    }

    fn supports_dangerous_mode(&self) -> bool {
        true
    }

    /// `GEMINI_DANGEROUS_ARGS` overrides the default flag.
    fn dangerous_args(&self) -> Vec<String> {
        match crate::env::gemini_dangerous_args() {
            Some(args) => args.split_whitespace().map(str::to_string).collect(),
            None => vec!["--yolo".to_string()],
        }
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

    /// Newest chat file under the hashed per-project directory.
    fn find_session_id(&self, _task_id: TaskId, work_dir: &Path) -> Option<String> {
        let dir = Self::chats_dir(work_dir)?;
        newest_file_in(&dir)?
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
    }

    fn process(&self) -> &ProcessControl {
        &self.process
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;

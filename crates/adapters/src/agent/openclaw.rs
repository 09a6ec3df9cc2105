// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenClaw CLI adapter.

use super::{assemble_command, Agent, LaunchRequest, ProcessControl};
use std::path::Path;
use std::sync::Arc;
use ty_core::TaskId;

/// Adapter for the OpenClaw CLI.
///
/// Sessions are synthetic (`task-{id}`), so resume never needs discovery.
/// There is no dangerous flag; OpenClaw's embedded auto-approve mode is
/// the only unrestricted surface it has.
pub struct OpenClawAgent {
    process: Arc<ProcessControl>,
}

impl OpenClawAgent {
    pub fn new(process: Arc<ProcessControl>) -> Self {
        Self { process }
    }
}

impl Agent for OpenClawAgent {
    fn name(&self) -> &'static str {
        "openclaw"
    }

    /// Binary overridable via `OPENCLAW_BIN`.
    fn binary(&self) -> String {
        crate::env::openclaw_bin().unwrap_or_else(|| self.name().to_string())
    }

    fn supports_session_resume(&self) -> bool {
        true
    }

    fn supports_dangerous_mode(&self) -> bool {
        false
    }

    fn build_command(&self, req: &LaunchRequest) -> String {
        let mut args: Vec<String> = Vec::new();
        if let Some(extra) = crate::env::openclaw_args() {
            args.extend(extra.split_whitespace().map(str::to_string));
        }
        args.push("--session".to_string());
        args.push(ty_core::task::window_name(req.task_id));
        assemble_command(&req.env, &self.binary(), &args, req.prompt_path.as_deref())
    }

    fn find_session_id(&self, task_id: TaskId, _work_dir: &Path) -> Option<String> {
        Some(ty_core::task::window_name(task_id))
    }

    fn process(&self) -> &ProcessControl {
        &self.process
    }
}

#[cfg(test)]
#[path = "openclaw_tests.rs"]
mod tests;

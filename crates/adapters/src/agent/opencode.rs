// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenCode CLI adapter.

use super::{assemble_command, Agent, LaunchRequest, ProcessControl};
use std::path::Path;
use std::sync::Arc;
use ty_core::TaskId;

/// Adapter for the OpenCode CLI.
///
/// No session resume and no dangerous mode; every run starts fresh.
pub struct OpenCodeAgent {
    process: Arc<ProcessControl>,
}

impl OpenCodeAgent {
    pub fn new(process: Arc<ProcessControl>) -> Self {
        Self { process }
    }
}

impl Agent for OpenCodeAgent {
    fn name(&self) -> &'static str {
        "opencode"
    }

    fn supports_session_resume(&self) -> bool {
        false
    }

    fn supports_dangerous_mode(&self) -> bool {
        false
    }

    fn build_command(&self, req: &LaunchRequest) -> String {
        let args = vec!["run".to_string()];
        assemble_command(&req.env, &self.binary(), &args, req.prompt_path.as_deref())
    }

    fn find_session_id(&self, _task_id: TaskId, _work_dir: &Path) -> Option<String> {
        None
    }

    fn process(&self) -> &ProcessControl {
        &self.process
    }
}

#[cfg(test)]
#[path = "opencode_tests.rs"]
mod tests;

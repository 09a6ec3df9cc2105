// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake agent adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Agent, LaunchRequest, ProcessControl};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use ty_core::TaskId;

/// Fake agent for engine tests.
///
/// Availability, capability flags, and discovered sessions are all
/// scriptable; build_command records the requests it saw.
pub struct FakeAgent {
    process: Arc<ProcessControl>,
    available: Mutex<bool>,
    session: Mutex<Option<String>>,
    requests: Mutex<Vec<LaunchRequest>>,
    supports_resume: bool,
    supports_dangerous: bool,
}

impl FakeAgent {
    pub fn new(process: Arc<ProcessControl>) -> Self {
        Self {
            process,
            available: Mutex::new(true),
            session: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            supports_resume: true,
            supports_dangerous: true,
        }
    }

    /// Fake without resume/dangerous support.
    pub fn minimal(process: Arc<ProcessControl>) -> Self {
        Self {
            supports_resume: false,
            supports_dangerous: false,
            ..Self::new(process)
        }
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }

    pub fn set_discovered_session(&self, session: Option<&str>) {
        *self.session.lock() = session.map(str::to_string);
    }

    /// Launch requests seen by `build_command`.
    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.requests.lock().clone()
    }
}

impl Agent for FakeAgent {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_available(&self) -> bool {
        *self.available.lock()
    }

    fn supports_session_resume(&self) -> bool {
        self.supports_resume
    }

    fn supports_dangerous_mode(&self) -> bool {
        self.supports_dangerous
    }

    fn dangerous_args(&self) -> Vec<String> {
        if self.supports_dangerous {
            vec!["--fake-dangerous".to_string()]
        } else {
            Vec::new()
        }
    }

    fn build_command(&self, req: &LaunchRequest) -> String {
        self.requests.lock().push(req.clone());
        let mut command = format!("fake-agent --task {}", req.task_id);
        if req.dangerous {
            command.push_str(" --fake-dangerous");
        }
        if let Some(session) = &req.session_id {
            command.push_str(&format!(" --resume {}", session));
        }
        command
    }

    fn find_session_id(&self, _task_id: TaskId, _work_dir: &Path) -> Option<String> {
        self.session.lock().clone()
    }

    fn process(&self) -> &ProcessControl {
        &self.process
    }
}

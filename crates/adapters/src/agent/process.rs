// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal-driven control plane over agent child processes.
//!
//! PIDs are discovered through the multiplexer's global pane enumeration:
//! a pane belongs to a task when its window is named `task-{id}`; the
//! agent process is either the pane's own command or a child of the
//! pane's shell.

use crate::mux::Multiplexer;
use crate::subprocess::{run_capture, PROBE_TIMEOUT};
use nix::sys::signal::{kill as send_signal, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use ty_core::task::window_name;
use ty_core::TaskId;

/// Shared process controller.
///
/// The suspended set here is the single source of truth for whether the
/// core regards a task's agent as paused; it is cleared whenever a task
/// finishes or its agent is killed.
pub struct ProcessControl {
    mux: Arc<dyn Multiplexer>,
    suspended: Mutex<HashMap<TaskId, Instant>>,
}

impl ProcessControl {
    pub fn new(mux: Arc<dyn Multiplexer>) -> Self {
        Self {
            mux,
            suspended: Mutex::new(HashMap::new()),
        }
    }

    /// Find the PID of the agent process for a task.
    ///
    /// Checks the pane's own command first (the multiplexer may exec the
    /// agent directly); otherwise consults child processes of the pane's
    /// shell.
    pub async fn find_pid(&self, task_id: TaskId, binary: &str) -> Option<i32> {
        let window = window_name(task_id);
        let panes = self.mux.list_panes_global().await.ok()?;

        for pane in panes.into_iter().filter(|p| p.window_name == window) {
            if pane.pid <= 0 {
                continue;
            }
            if command_matches(&pane.command, binary) {
                return Some(pane.pid);
            }
            if let Some(child) = child_pid_matching(pane.pid, binary).await {
                return Some(child);
            }
        }
        None
    }

    /// Terminate the agent process. Clears any suspended record.
    pub async fn kill(&self, task_id: TaskId, binary: &str) -> bool {
        let Some(pid) = self.find_pid(task_id, binary).await else {
            self.clear(task_id);
            return false;
        };
        let ok = signal(pid, Signal::SIGTERM);
        self.clear(task_id);
        if ok {
            tracing::info!(task_id, pid, "agent process terminated");
        }
        ok
    }

    /// Pause the agent process and record it in the suspended set.
    pub async fn suspend(&self, task_id: TaskId, binary: &str) -> bool {
        let Some(pid) = self.find_pid(task_id, binary).await else {
            return false;
        };
        if !signal(pid, Signal::SIGTSTP) {
            return false;
        }
        self.suspended.lock().insert(task_id, Instant::now());
        tracing::info!(task_id, pid, "agent process suspended");
        true
    }

    /// Continue a suspended agent process and drop its suspended record.
    pub async fn resume(&self, task_id: TaskId, binary: &str) -> bool {
        let Some(pid) = self.find_pid(task_id, binary).await else {
            return false;
        };
        if !signal(pid, Signal::SIGCONT) {
            return false;
        }
        self.suspended.lock().remove(&task_id);
        tracing::info!(task_id, pid, "agent process resumed");
        true
    }

    pub fn is_suspended(&self, task_id: TaskId) -> bool {
        self.suspended.lock().contains_key(&task_id)
    }

    /// Drop the suspended record without signalling (task finished or
    /// agent killed).
    pub fn clear(&self, task_id: TaskId) {
        self.suspended.lock().remove(&task_id);
    }

    /// Task ids currently recorded as suspended.
    pub fn suspended_tasks(&self) -> Vec<TaskId> {
        self.suspended.lock().keys().copied().collect()
    }
}

fn signal(pid: i32, sig: Signal) -> bool {
    match send_signal(Pid::from_raw(pid), sig) {
        Ok(()) => true,
        Err(errno) => {
            tracing::warn!(pid, signal = ?sig, errno = %errno, "signal delivery failed");
            false
        }
    }
}

/// Whether a pane command refers to the given binary.
fn command_matches(command: &str, binary: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .and_then(|first| first.rsplit('/').next())
        .is_some_and(|base| base == binary)
}

/// First child of `parent` whose command matches `binary`.
async fn child_pid_matching(parent: i32, binary: &str) -> Option<i32> {
    let mut cmd = Command::new("pgrep");
    cmd.args(["-P", &parent.to_string(), "-f", binary]);
    let stdout = run_capture(cmd, PROBE_TIMEOUT, "pgrep children").await?;
    stdout.lines().find_map(|line| line.trim().parse().ok())
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake multiplexer for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Multiplexer, MuxError, PaneInfo, DAEMON_SESSION};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded multiplexer call
#[derive(Debug, Clone)]
pub enum MuxCall {
    EnsureDaemonSession,
    CreateWindow {
        session: String,
        name: String,
        cwd: PathBuf,
        command: String,
        env: Vec<(String, String)>,
    },
    KillWindowsByName {
        name: String,
    },
    SplitPane {
        target: String,
        cwd: PathBuf,
    },
    SendKeys {
        target: String,
        keys: Vec<String>,
    },
    CaptureOutput {
        target: String,
        lines: u32,
    },
    WindowExists {
        target: String,
    },
}

/// Fake window state
#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub session: String,
    pub name: String,
    pub window_id: String,
    pub cwd: PathBuf,
    pub command: String,
    pub env: Vec<(String, String)>,
    pub alive: bool,
    pub pane_pid: i32,
    pub output: Vec<String>,
}

#[derive(Default)]
struct FakeMuxState {
    windows: Vec<FakeWindow>,
    calls: Vec<MuxCall>,
    next_id: u64,
}

/// Fake multiplexer gateway for testing
#[derive(Clone, Default)]
pub struct FakeMux {
    inner: Arc<Mutex<FakeMuxState>>,
}

impl FakeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<MuxCall> {
        self.inner.lock().calls.clone()
    }

    /// Get all live windows with the given name
    pub fn windows_named(&self, name: &str) -> Vec<FakeWindow> {
        self.inner
            .lock()
            .windows
            .iter()
            .filter(|w| w.name == name && w.alive)
            .cloned()
            .collect()
    }

    /// Close a window (simulates the agent exiting and the pane closing)
    pub fn close_window(&self, name: &str) {
        for window in self.inner.lock().windows.iter_mut() {
            if window.name == name {
                window.alive = false;
            }
        }
    }

    /// Set the pane PID reported for a window's pane
    pub fn set_pane_pid(&self, name: &str, pid: i32) {
        for window in self.inner.lock().windows.iter_mut() {
            if window.name == name {
                window.pane_pid = pid;
            }
        }
    }

    /// Set the command reported for a window's pane
    pub fn set_pane_command(&self, name: &str, command: &str) {
        for window in self.inner.lock().windows.iter_mut() {
            if window.name == name {
                window.command = command.to_string();
            }
        }
    }

    /// Pre-register a live window without going through create_window
    pub fn add_window(&self, session: &str, name: &str, pid: i32, command: &str) {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let window_id = format!("@{}", inner.next_id);
        inner.windows.push(FakeWindow {
            session: session.to_string(),
            name: name.to_string(),
            window_id,
            cwd: PathBuf::new(),
            command: command.to_string(),
            env: Vec::new(),
            alive: true,
            pane_pid: pid,
            output: Vec::new(),
        });
    }
}

#[async_trait]
impl Multiplexer for FakeMux {
    async fn ensure_daemon_session(&self) -> Result<String, MuxError> {
        self.inner.lock().calls.push(MuxCall::EnsureDaemonSession);
        Ok(DAEMON_SESSION.to_string())
    }

    async fn create_window(
        &self,
        session: &str,
        name: &str,
        cwd: &Path,
        command: &str,
        env: &[(String, String)],
    ) -> Result<String, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::CreateWindow {
            session: session.to_string(),
            name: name.to_string(),
            cwd: cwd.to_path_buf(),
            command: command.to_string(),
            env: env.to_vec(),
        });

        inner.next_id += 1;
        let window_id = format!("@{}", inner.next_id);
        inner.windows.push(FakeWindow {
            session: session.to_string(),
            name: name.to_string(),
            window_id: window_id.clone(),
            cwd: cwd.to_path_buf(),
            command: command.to_string(),
            env: env.to_vec(),
            alive: true,
            pane_pid: 0,
            output: Vec::new(),
        });

        Ok(window_id)
    }

    async fn kill_windows_by_name(&self, name: &str) -> Result<usize, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::KillWindowsByName {
            name: name.to_string(),
        });

        let mut killed = 0;
        for window in inner.windows.iter_mut() {
            if window.name == name && window.alive {
                window.alive = false;
                killed += 1;
            }
        }
        Ok(killed)
    }

    async fn split_pane_horizontal(
        &self,
        target: &str,
        cwd: &Path,
        _env: &[(String, String)],
    ) -> Result<(), MuxError> {
        self.inner.lock().calls.push(MuxCall::SplitPane {
            target: target.to_string(),
            cwd: cwd.to_path_buf(),
        });
        Ok(())
    }

    async fn send_keys(&self, target: &str, keys: &[String]) -> Result<(), MuxError> {
        self.inner.lock().calls.push(MuxCall::SendKeys {
            target: target.to_string(),
            keys: keys.to_vec(),
        });
        Ok(())
    }

    async fn capture_output(&self, target: &str, lines: u32) -> Result<String, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::CaptureOutput {
            target: target.to_string(),
            lines,
        });

        match inner
            .windows
            .iter()
            .find(|w| w.window_id == target || w.name == target)
        {
            Some(window) => {
                let start = window.output.len().saturating_sub(lines as usize);
                Ok(window.output[start..].join("\n"))
            }
            None => Err(MuxError::NotFound(target.to_string())),
        }
    }

    async fn get_window_id(&self, session: &str, name: &str) -> Result<Option<String>, MuxError> {
        Ok(self
            .inner
            .lock()
            .windows
            .iter()
            .find(|w| w.session == session && w.name == name && w.alive)
            .map(|w| w.window_id.clone()))
    }

    async fn list_panes_global(&self) -> Result<Vec<PaneInfo>, MuxError> {
        Ok(self
            .inner
            .lock()
            .windows
            .iter()
            .filter(|w| w.alive)
            .map(|w| PaneInfo {
                session: w.session.clone(),
                window_name: w.name.clone(),
                window_id: w.window_id.clone(),
                pane_id: format!("%{}", w.window_id.trim_start_matches('@')),
                pid: w.pane_pid,
                command: w.command.clone(),
            })
            .collect())
    }

    async fn window_exists(&self, target: &str) -> Result<bool, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::WindowExists {
            target: target.to_string(),
        });
        Ok(inner
            .windows
            .iter()
            .any(|w| w.alive && (w.window_id == target || w.name == target || target.ends_with(&w.name) || target.ends_with(&w.window_id))))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

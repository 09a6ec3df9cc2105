// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal multiplexer gateway.
//!
//! A thin façade over a detachable window multiplexer. Task windows are
//! named `task-{id}` inside a long-lived daemon session; a placeholder
//! window keeps the session alive when no tasks are running.

mod tmux;

pub use tmux::TmuxMux;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMux, FakeWindow, MuxCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Name of the long-lived session owning task windows.
pub const DAEMON_SESSION: &str = "taskyou";

/// Errors from multiplexer operations
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("target not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// One pane in the global enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    pub session: String,
    pub window_name: String,
    /// Opaque stable window identifier (survives session renames).
    pub window_id: String,
    pub pane_id: String,
    pub pid: i32,
    /// The pane's current foreground command.
    pub command: String,
}

/// Gateway over a detachable named terminal multiplexer.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Ensure the long-lived daemon session exists and return its name.
    async fn ensure_daemon_session(&self) -> Result<String, MuxError>;

    /// Create a named window running `command` inside `session`.
    ///
    /// Returns the opaque window id. Retries once (recreating the session)
    /// if the session vanished between lookup and create.
    async fn create_window(
        &self,
        session: &str,
        name: &str,
        cwd: &Path,
        command: &str,
        env: &[(String, String)],
    ) -> Result<String, MuxError>;

    /// Kill every window with this name, across all sessions.
    ///
    /// Returns how many windows were killed. A missing name is not an
    /// error.
    async fn kill_windows_by_name(&self, name: &str) -> Result<usize, MuxError>;

    /// Split a second pane for an interactive shell next to `target`.
    async fn split_pane_horizontal(
        &self,
        target: &str,
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<(), MuxError>;

    /// Send keystrokes to a pane.
    async fn send_keys(&self, target: &str, keys: &[String]) -> Result<(), MuxError>;

    /// Capture the last `lines` lines of a pane.
    async fn capture_output(&self, target: &str, lines: u32) -> Result<String, MuxError>;

    /// Look up the opaque window id for a named window, if it exists.
    async fn get_window_id(&self, session: &str, name: &str) -> Result<Option<String>, MuxError>;

    /// Enumerate every pane in every session.
    async fn list_panes_global(&self) -> Result<Vec<PaneInfo>, MuxError>;

    /// Whether a window target currently exists.
    async fn window_exists(&self, target: &str) -> Result<bool, MuxError>;
}
